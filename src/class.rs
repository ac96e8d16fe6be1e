// Copyright 2025 the respite authors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`Class`] type for DNS classes.

use std::fmt;
use std::str::FromStr;

use crate::util::Caseless;

/// The 16-bit class field of a question or resource record.
///
/// The resolver core handles Internet-class data only, so the two
/// values that actually appear in this crate are [`Class::IN`] and the
/// [`Class::ANY`] QCLASS, which the record filter accepts as a
/// wildcard. Any other value still round-trips through the wrapped
/// integer, and the textual conversions fall back to the
/// `CLASS<number>` notation that RFC 3597 § 5 defines for classes
/// without a mnemonic.
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Class(u16);

impl Class {
    pub const IN: Self = Self(1);
    pub const ANY: Self = Self(255);
}

impl From<u16> for Class {
    fn from(value: u16) -> Self {
        Class(value)
    }
}

impl From<Class> for u16 {
    fn from(class: Class) -> Self {
        class.0
    }
}

/// Accepts the `IN` and `ANY` mnemonics and the RFC 3597 § 5
/// `CLASS<number>` notation, all case-insensitively.
impl FromStr for Class {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match Caseless(text) {
            Caseless("IN") => Ok(Self::IN),
            Caseless("ANY") => Ok(Self::ANY),
            _ => {
                let generic = text
                    .get(0..5)
                    .filter(|prefix| prefix.eq_ignore_ascii_case("CLASS"))
                    .map(|_| &text[5..]);
                match generic {
                    Some(number) => number
                        .parse::<u16>()
                        .map(Self::from)
                        .or(Err("class number does not fit in 16 bits")),
                    None => Err("unknown class"),
                }
            }
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", *self)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::IN => f.write_str("IN"),
            Self::ANY => f.write_str("ANY"),
            Self(value) => write!(f, "CLASS{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Class;

    #[test]
    fn mnemonics_round_trip_through_text() {
        assert_eq!(Class::IN.to_string(), "IN");
        assert_eq!("IN".parse::<Class>().unwrap(), Class::IN);
        assert_eq!(Class::ANY.to_string(), "ANY");
        assert_eq!("ANY".parse::<Class>().unwrap(), Class::ANY);
    }

    #[test]
    fn values_without_mnemonics_use_the_generic_notation() {
        // Class 42 is unassigned, so both directions must go through
        // the CLASS<number> form.
        let class = Class::from(42);
        assert_eq!(class.to_string(), "CLASS42");
        assert_eq!("CLASS42".parse::<Class>().unwrap(), class);
    }

    #[test]
    fn parsing_ignores_case() {
        assert_eq!("in".parse::<Class>().unwrap(), Class::IN);
        assert_eq!("any".parse::<Class>().unwrap(), Class::ANY);
        assert_eq!("class1".parse::<Class>().unwrap(), Class::IN);
    }

    #[test]
    fn parsing_rejects_garbage() {
        assert!("HS".parse::<Class>().is_err());
        assert!("CLASS".parse::<Class>().is_err());
        assert!("CLASS99999".parse::<Class>().is_err());
        assert!("CLASSx".parse::<Class>().is_err());
    }
}
