// #[macro_export] is required to make macros work across crates but it
// always puts the macro at the crate root. #[doc(hidden)] + "pub use" is a
// workaround to namespace a macro the way the rest of this crate is namespaced.
pub use crate::{__debug as debug, __error as error, __trace as trace, __warn as warn};

#[doc(hidden)]
#[macro_export]
macro_rules! __error {
    ($($arg:tt)+) => {
        #[cfg(feature = "std")]
        {
            //eprintln!($($arg)+);
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __warn {
    ($($arg:tt)+) => {
        #[cfg(feature = "std")]
        {
            //eprintln!($($arg)+);
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __debug {
    ($($arg:tt)+) => {};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __trace {
    ($($arg:tt)+) => {};
}
