//! Build-version drift detection. The first handshake of the session sets
//! the expected build; every later handshake is compared against it. A
//! mismatch is only reported, the client is never turned away.

use crate::identity::ClientIdentity;
use log::{info, warn};

/// What a handshake told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildCheck {
    /// First handshake of the session; its build is now the expected one.
    Recorded(u64),
    /// Same build as expected.
    Matched,
    /// Different build. The expected build is unchanged.
    Mismatch {
        /// The session's build.
        expected: u64,
        /// What the client claimed.
        reported: u64,
    },
}

/// Remembers the first build number reported and checks every later
/// handshake against it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReconciler {
    build: Option<u64>,
}

impl BuildReconciler {
    /// A reconciler that has not seen a handshake yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The build recorded from the first handshake, if one has arrived.
    pub fn build(&self) -> Option<u64> {
        self.build
    }

    /// Checks one handshake and logs the outcome.
    pub fn observe(&mut self, client: &ClientIdentity, reported: u64) -> BuildCheck {
        match self.build {
            None => {
                self.build = Some(reported);
                info!("{} set the session build to {}", client, reported);
                BuildCheck::Recorded(reported)
            }
            Some(expected) if expected == reported => BuildCheck::Matched,
            Some(expected) => {
                warn!(
                    "build mismatch: {} reports build {}, session expects {}",
                    client, reported, expected
                );
                BuildCheck::Mismatch { expected, reported }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_handshake_sets_the_build() {
        let mut rec = BuildReconciler::new();
        assert_eq!(rec.build(), None);
        assert_eq!(
            rec.observe(&"a".into(), 5),
            BuildCheck::Recorded(5)
        );
        assert_eq!(rec.build(), Some(5));
    }

    #[test]
    fn mismatch_is_reported_once_and_never_overwrites() {
        let mut rec = BuildReconciler::new();
        let checks = [5, 5, 6]
            .into_iter()
            .map(|b| rec.observe(&"a".into(), b))
            .collect::<Vec<_>>();

        assert_eq!(
            checks,
            vec![
                BuildCheck::Recorded(5),
                BuildCheck::Matched,
                BuildCheck::Mismatch {
                    expected: 5,
                    reported: 6
                },
            ]
        );
        assert_eq!(
            checks
                .iter()
                .filter(|c| matches!(c, BuildCheck::Mismatch { .. }))
                .count(),
            1
        );
        assert_eq!(rec.build(), Some(5));
    }
}
