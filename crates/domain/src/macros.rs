//! Display/FromStr generation for persisted status enums
//!
//! Status enums are stored as text columns; this macro keeps the stored
//! spelling and the parser in one place.
//!
//! # Example
//!
//! ```rust
//! use calsync_domain::impl_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ChannelState {
//!     Active,
//!     Expired,
//! }
//!
//! impl_status_conversions!(ChannelState {
//!     Active => "ACTIVE",
//!     Expired => "EXPIRED",
//! });
//!
//! assert_eq!(ChannelState::Active.to_string(), "ACTIVE");
//! assert_eq!("expired".parse::<ChannelState>(), Ok(ChannelState::Expired));
//! ```

/// Implements `Display`, `FromStr` and `as_str` for a fieldless enum.
///
/// Parsing ignores ASCII case; `Display` always emits the canonical spelling.
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical stored spelling.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
