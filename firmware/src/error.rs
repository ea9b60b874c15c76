// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;

/// Scarce hardware resources claimed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Dma,
    Timer,
    Adc,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Dma => write!(f, "DMA channel"),
            Resource::Timer => write!(f, "repeating timer"),
            Resource::Adc => write!(f, "ADC"),
        }
    }
}

/// Configuration errors.
///
/// These are reported synchronously to the caller and are not retryable.
/// The affected channel or analyzer is left inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("pin {0} is not available")]
    InvalidPin(u8),
    #[error("sense and trigger pins need to be different")]
    SensePinIsTrigger,
    #[error("no trigger pins given")]
    NoTriggerPins,
    #[error("too many trigger pins")]
    TooManyTriggerPins,
    #[error("voltage and current pins need to be different")]
    SameAnalogPin,
    #[error("pin {0} is already in use")]
    PinInUse(u8),
    #[error("invalid {0}")]
    OutOfRange(&'static str),
    #[error("{0} could not be acquired")]
    Resource(Resource),
    #[error("already configured, close it first")]
    Busy,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::PinInUse(3).to_string(), "pin 3 is already in use");
        assert_eq!(Error::OutOfRange("on-time").to_string(), "invalid on-time");
        assert_eq!(
            Error::Resource(Resource::Dma).to_string(),
            "DMA channel could not be acquired"
        );
    }
}

// vim: ts=4 sw=4 expandtab
