// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Small macros for declaring enum state machines with checked transitions

use core::fmt;

pub type Result<T> = core::result::Result<(), Error<T>>;

#[macro_export]
#[doc(hidden)]
macro_rules! __state_transition__ {
    (@build [$($targets:expr),*], $event:ident, $state:ident, [$valid:pat => $target:expr] $($remaining:tt)*) => {{
        // if the transition is valid, then perform it
        if matches!($state, $valid) {
            *$state = $target;
            Ok(())
        } else {
            $crate::state::transition!(
                @build [$($targets,)* $target],
                $event,
                $state,
                $($remaining)*
            )
        }
    }};
    (@build [$($targets:expr),*], $event:ident, $state:ident $(,)?) => {{
        let targets = [$($targets),*];

        // if we only have a single target and the current state matches it, then return a no-op
        if targets.len() == 1 && targets[0].eq($state) {
            let current = targets[0].clone();
            Err($crate::state::Error::NoOp { current })
        } else {
            // if we didn't get a valid match then error out
            Err($crate::state::Error::InvalidTransition {
                current: $state.clone(),
                event: stringify!($event),
            })
        }
    }};
}

pub use crate::__state_transition__ as transition;

#[macro_export]
#[doc(hidden)]
macro_rules! __state_event__ {
    ($(
        $(#[doc = $doc:literal])*
        $event:ident (
            $(
                $($valid:ident)|* => $target:ident
            ),*
            $(,)?
        );
    )*) => {
        $(
            $(
                #[doc = $doc]
            )*
            #[inline]
            pub fn $event(&mut self) -> $crate::state::Result<Self> {
                $crate::state::transition!(
                    @build [],
                    $event,
                    self,
                    $(
                        [$(Self::$valid)|* => Self::$target]
                    )*
                )
            }
        )*
    };
}

pub use crate::__state_event__ as event;

#[macro_export]
#[doc(hidden)]
macro_rules! __state_is__ {
    ($(#[doc = $doc:literal])* $function:ident, $($state:ident)|+) => {
        $(
            #[doc = $doc]
        )*
        #[inline]
        pub fn $function(&self) -> bool {
            matches!(self, $(Self::$state)|*)
        }
    };
}

pub use crate::__state_is__ as is;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error<T> {
    /// The state machine was already in the target state
    NoOp { current: T },
    /// The event is not valid for the current state
    InvalidTransition { current: T, event: &'static str },
}

impl<T: fmt::Debug> fmt::Display for Error<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp { current } => {
                write!(f, "state is already {current:?}")
            }
            Self::InvalidTransition { current, event } => {
                write!(f, "invalid event {event:?} for state {current:?}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl<T: fmt::Debug> std::error::Error for Error<T> {}

#[cfg(test)]
mod tests {
    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    enum Light {
        #[default]
        Red,
        Yellow,
        Green,
    }

    impl Light {
        super::is!(is_red, Red);

        super::event! {
            on_go(Red | Yellow => Green);
            on_stop(Green | Yellow => Red);
        }
    }

    #[test]
    fn transition_test() {
        let mut light = Light::default();
        assert!(light.is_red());

        light.on_go().unwrap();
        assert_eq!(light, Light::Green);

        // no-op transitions report the current state
        assert!(light.on_go().is_err());

        light.on_stop().unwrap();
        assert_eq!(light, Light::Red);
    }
}
