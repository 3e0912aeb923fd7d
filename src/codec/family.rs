// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::error::Error;

/// Defines the family of a serialized sketch image.
///
/// The family byte lets a reader reject images written by an unrelated sketch before looking at
/// any mode-specific field.
pub(crate) struct Family {
    /// The byte ID for this family.
    pub id: u8,
    /// The name for this family.
    pub name: &'static str,
    /// The minimum preamble size for this family in ints (4-bytes integer).
    pub min_pre_ints: u8,
    /// The maximum preamble size for this family in ints (4-bytes integer).
    pub max_pre_ints: u8,
}

impl Family {
    /// The HLL family of sketches.
    pub const HLL: Family = Family {
        id: 7,
        name: "HLL",
        min_pre_ints: 2,
        max_pre_ints: 10,
    };
}

impl Family {
    pub fn validate_id(&self, family_id: u8) -> Result<(), Error> {
        if family_id != self.id {
            Err(Error::invalid_family(self.id, family_id, self.name))
        } else {
            Ok(())
        }
    }

    pub fn validate_pre_ints(&self, pre_ints: u8) -> Result<(), Error> {
        if (self.min_pre_ints..=self.max_pre_ints).contains(&pre_ints) {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "{} preamble ints must be in [{}, {}], got {pre_ints}",
                self.name, self.min_pre_ints, self.max_pre_ints
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_validate_hll_family() {
        assert!(Family::HLL.validate_id(7).is_ok());
        let err = Family::HLL.validate_id(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(Family::HLL.validate_pre_ints(3).is_ok());
        assert!(Family::HLL.validate_pre_ints(11).is_err());
    }
}
