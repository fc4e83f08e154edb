//! Internal testing utilities for the pbstream crates.

use std::fmt::Debug;
use std::panic::RefUnwindSafe;

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// To create a table driven test:
///
/// 1. Import the `TestCases` trait
/// 2. Create a struct, conventionally named `Case`, that contains the data
///    for a single test case. This struct must implement `Debug`.
/// 3. Create a collection of `Case` instances (eg. an array or Vec),
///    conventionally named `cases`.
/// 4. Call `cases.test_each`, passing the test function as a closure
///
/// `test_each` runs every case and catches panics. If all cases succeed it
/// returns; otherwise it panics with the count and debug representations of
/// the failing cases, so a single run reports every broken case rather than
/// just the first.
///
/// ## Example
///
/// ```
/// use pbstream_testing::TestCases;
///
/// // Add #[test] attribute
/// fn test_zigzag() {
///   #[derive(Debug)]
///   struct Case {
///     encoded: u64,
///     decoded: i32,
///   }
///
///   let cases = [
///     Case { encoded: 0, decoded: 0 },
///     Case { encoded: 1, decoded: -1 },
///     Case { encoded: 2, decoded: 1 },
///   ];
///
///   cases.test_each(|&Case { encoded, decoded }| {
///     assert_eq!(((encoded as u32 >> 1) as i32) ^ -((encoded & 1) as i32), decoded);
///   });
/// }
/// # test_zigzag();
/// ```
///
/// ## Unwind safety
///
/// Test cases and the test function must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
/// Practically this means values captured by the test closure must not
/// contain interior mutability; values created _within_ the closure may.
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call test function `test` with each case in `self`, catching panics.
    ///
    /// Returns if no case panicked, or panics with details of the failing
    /// cases otherwise.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            if std::panic::catch_unwind(|| {
                test(&case);
            })
            .is_err()
            {
                failures.push(case);
            }
        }
        assert_eq!(
            failures.len(),
            0,
            "{} test cases failed: {:?}",
            failures.len(),
            failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::TestCases;

    #[test]
    fn test_test_each_success() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| _ = case.x);
    }

    #[test]
    #[should_panic(expected = "2 test cases failed")]
    fn test_test_each_failure() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| {
            _ = case.x;
            panic!("oh no");
        })
    }
}
