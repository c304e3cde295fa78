/// Switch between rayon and sequential execution.
///
/// With the `parallel` feature (default) this re-exports rayon's parallel
/// iterator traits. Without it, a sequential stand-in keeps the same call
/// sites compiling: `into_par_iter()` simply becomes `into_iter()`, and the
/// remainder of the chain resolves to ordinary `Iterator` methods.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
