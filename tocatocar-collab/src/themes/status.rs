use crate::{CollabError, CollabResult, ThemeStatus};

/// What assigning a status to a theme amounts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The theme already has the status
    Unchanged,
    /// The theme moves along an allowed edge
    Move,
}

impl ThemeStatus {
    /// Whether a theme can go straight from this status to `to`
    pub fn can_become(self, to: ThemeStatus) -> bool {
        use ThemeStatus::*;

        matches!(
            (self, to),
            (Open, Queued) | (Queued, Playing) | (Queued, Open) | (Playing, Finished)
        )
    }

    pub fn transition_to(self, to: ThemeStatus) -> CollabResult<Transition> {
        if self == to {
            return Ok(Transition::Unchanged);
        }

        if self.can_become(to) {
            Ok(Transition::Move)
        } else {
            Err(CollabError::InvalidTransition { from: self, to })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ThemeStatus::*;

    #[test]
    fn test_allowed_edges() {
        assert_eq!(Open.transition_to(Queued).unwrap(), Transition::Move);
        assert_eq!(Queued.transition_to(Playing).unwrap(), Transition::Move);
        assert_eq!(Queued.transition_to(Open).unwrap(), Transition::Move);
        assert_eq!(Playing.transition_to(Finished).unwrap(), Transition::Move);
        assert_eq!(Playing.transition_to(Playing).unwrap(), Transition::Unchanged);
    }

    #[test]
    fn test_rejected_edges() {
        let rejected = [
            (Open, Playing),
            (Open, Finished),
            (Queued, Finished),
            (Playing, Open),
            (Playing, Queued),
            (Finished, Open),
            (Finished, Queued),
            (Finished, Playing),
        ];

        for (from, to) in rejected {
            assert!(
                matches!(
                    from.transition_to(to),
                    Err(CollabError::InvalidTransition { .. })
                ),
                "{} -> {} should be rejected",
                from,
                to
            );
        }
    }
}
