//! Zone token resolution

use crate::config::ConfigSet;
use crate::error::ValidationFailure;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneGroup {
    Private,
    Public,
}

/// A zone token resolved to its group and that group's domain suffixes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedZone<'a> {
    pub group: ZoneGroup,
    pub domains: &'a [String],
}

/// Maps zone tokens to the domain suffixes of their group
#[derive(Clone, Copy, Debug)]
pub struct ZoneResolver<'a> {
    config: &'a ConfigSet,
}

impl<'a> ZoneResolver<'a> {
    pub fn new(config: &'a ConfigSet) -> Self {
        Self { config }
    }

    /// Resolve a token; private membership wins if a token is in both groups
    pub fn resolve(&self, token: &str) -> Result<ResolvedZone<'a>, ValidationFailure> {
        if self.config.private_zone_tokens.contains(token) {
            Ok(ResolvedZone {
                group: ZoneGroup::Private,
                domains: &self.config.private_domains,
            })
        } else if self.config.public_zone_tokens.contains(token) {
            Ok(ResolvedZone {
                group: ZoneGroup::Public,
                domains: &self.config.public_domains,
            })
        } else {
            Err(ValidationFailure::UnknownZone(token.to_string()))
        }
    }

    pub fn is_known(&self, token: &str) -> bool {
        self.resolve(token).is_ok()
    }
}
