/// Rounds `value` up to the next multiple of `align`, which must be a power
/// of two.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// assert_eq!(align_to!(1, 2), 2);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Rounds `value` up to the heap alignment unit ([`crate::HEAP_ALIGN`]).
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(1014 + 2), 1016);
/// assert_eq!(align!(22 + 2), 24);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::HEAP_ALIGN)
  };
}

#[cfg(test)]
mod tests {
  use crate::HEAP_ALIGN;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (HEAP_ALIGN * i + 1)..=(HEAP_ALIGN * (i + 1));

      let expected_alignment = HEAP_ALIGN * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_to_power_of_two() {
    assert_eq!(align_to!(0usize, 16), 0);
    assert_eq!(align_to!(17usize, 16), 32);
    assert_eq!(align_to!(4usize, 2), 4);
  }
}
