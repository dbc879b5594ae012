//! Error type definitions for the pinirq crates.
//!
//! Every crate declares its errors through [`define_error!`] so that all of
//! them share the same shape: a subsystem byte, a 16-bit code and a static
//! description that can be printed from any context without allocating.
//!
//! ## Usage
//!
//! ### Simple errors
//! ```ignore
//! define_error! {
//!     pub enum HalError(0x01) {
//!         NoFreeVector = 0x01 => "No free interrupt vector on core",
//!     }
//! }
//! ```
//!
//! ### Wrapping a lower layer
//! ```ignore
//! define_error! {
//!     pub enum IsrError(0x02) {
//!         InvalidState = 0x01 => "Service not installed or line not registered",
//!         Hal(HalError) = 0x04 => "Interrupt hardware rejected the request",
//!     }
//! }
//! ```

#![no_std]

/// Define an error enum with a subsystem code.
///
/// Variants either carry nothing or wrap exactly one inner error, which is
/// printed after the description.
#[macro_export]
macro_rules! define_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($subsystem:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $(($inner:ty))? = $code:literal => $desc:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant $(($inner))?,
            )*
        }

        impl $name {
            /// Subsystem byte shared by every variant of this type.
            pub const SUBSYSTEM: u8 = $subsystem;

            /// Numeric code: subsystem in the high byte, variant in the low byte.
            pub const fn code(&self) -> u16 {
                match self {
                    $(
                        $crate::define_error!(@arm $variant $(($inner))?) => {
                            (($subsystem as u16) << 8) | ($code as u16)
                        }
                    )*
                }
            }

            /// Static description of the variant.
            pub const fn description(&self) -> &'static str {
                match self {
                    $(
                        $crate::define_error!(@arm $variant $(($inner))?) => $desc,
                    )*
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "E{:04X}: {}", self.code(), self.description())?;
                match self {
                    $(
                        $crate::define_error!(@bind $variant $(($inner))? inner) => {
                            $crate::define_error!(@suffix f $(($inner))? inner)
                        }
                    )*
                }
            }
        }

        impl core::error::Error for $name {}
    };

    (@arm $variant:ident ($inner:ty)) => { Self::$variant(_) };
    (@arm $variant:ident) => { Self::$variant };

    (@bind $variant:ident ($inner:ty) $bind:ident) => { Self::$variant($bind) };
    (@bind $variant:ident $bind:ident) => { Self::$variant };

    (@suffix $f:ident ($inner:ty) $bind:ident) => { write!($f, " ({})", $bind) };
    (@suffix $f:ident $bind:ident) => { Ok(()) };
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    define_error! {
        /// Lower layer used by the tests
        pub enum BusError(0x7E) {
            /// Nothing answered
            Timeout = 0x01 => "Bus timeout",
            Parity = 0x02 => "Parity error",
        }
    }

    define_error! {
        pub enum DriverError(0x7F) {
            Busy = 0x01 => "Driver busy",
            Bus(BusError) = 0x02 => "Bus transfer failed",
        }
    }

    #[test]
    fn codes_pack_subsystem_and_variant() {
        assert_eq!(BusError::Timeout.code(), 0x7E01);
        assert_eq!(BusError::Parity.code(), 0x7E02);
        assert_eq!(DriverError::Busy.code(), 0x7F01);
        assert_eq!(DriverError::Bus(BusError::Parity).code(), 0x7F02);
    }

    #[test]
    fn descriptions_ignore_inner_error() {
        assert_eq!(BusError::Timeout.description(), "Bus timeout");
        assert_eq!(
            DriverError::Bus(BusError::Timeout).description(),
            "Bus transfer failed"
        );
    }

    #[test]
    fn display_appends_inner_error() {
        assert_eq!(format!("{}", DriverError::Busy), "E7F01: Driver busy");
        assert_eq!(
            format!("{}", DriverError::Bus(BusError::Timeout)),
            "E7F02: Bus transfer failed (E7E01: Bus timeout)"
        );
    }

    #[test]
    fn subsystem_constant() {
        assert_eq!(BusError::SUBSYSTEM, 0x7E);
        assert_eq!(DriverError::SUBSYSTEM, 0x7F);
    }

    #[test]
    fn usable_as_core_error() {
        fn describe(err: &dyn core::error::Error) -> std::string::String {
            format!("{err}")
        }
        assert_eq!(describe(&BusError::Parity), "E7E02: Parity error");
    }
}
