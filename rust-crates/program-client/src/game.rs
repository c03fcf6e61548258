use std::fmt;

pub const GAME_ACCOUNT_SPACE: usize = 28;

/// Decoded game account data. The program stores every field big-endian.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GameAccount {
    pub roll_under: u32,
    pub hashed_reveal: u64,
    pub commit_slot: u64,
    pub result: u64,
}

impl GameAccount {
    /// A freshly created account is all zeroes until the first commit.
    pub fn is_committed(&self) -> bool {
        self.commit_slot != 0 || self.hashed_reveal != 0
    }

    pub fn is_resolved(&self) -> bool {
        self.result != 0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidGameAccount(pub usize);

impl fmt::Display for InvalidGameAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "game account data is {} bytes, expected at least {GAME_ACCOUNT_SPACE}",
            self.0
        )
    }
}

impl std::error::Error for InvalidGameAccount {}

impl TryFrom<&[u8]> for GameAccount {
    type Error = InvalidGameAccount;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let Some(data) = data.get(..GAME_ACCOUNT_SPACE) else {
            return Err(InvalidGameAccount(data.len()));
        };
        let u64_at = |start: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&data[start..start + 8]);
            u64::from_be_bytes(buf)
        };
        let mut roll_under = [0u8; 4];
        roll_under.copy_from_slice(&data[0..4]);
        Ok(GameAccount {
            roll_under: u32::from_be_bytes(roll_under),
            hashed_reveal: u64_at(4),
            commit_slot: u64_at(12),
            result: u64_at(20),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn try_from__decodes_big_endian_fields() {
        // given
        let mut data = vec![0u8; GAME_ACCOUNT_SPACE];
        data[0..4].copy_from_slice(&51u32.to_be_bytes());
        data[4..12].copy_from_slice(&0xdead_beefu64.to_be_bytes());
        data[12..20].copy_from_slice(&1_234u64.to_be_bytes());
        data[20..28].copy_from_slice(&42u64.to_be_bytes());

        // when
        let game = GameAccount::try_from(data.as_slice()).unwrap();

        // then
        assert_eq!(
            game,
            GameAccount {
                roll_under: 51,
                hashed_reveal: 0xdead_beef,
                commit_slot: 1_234,
                result: 42,
            }
        );
        assert!(game.is_committed());
        assert!(game.is_resolved());
    }

    #[test]
    fn try_from__fresh_account_is_uncommitted() {
        let game = GameAccount::try_from([0u8; GAME_ACCOUNT_SPACE].as_slice()).unwrap();
        assert!(!game.is_committed());
        assert!(!game.is_resolved());
    }

    #[test]
    fn try_from__rejects_short_data() {
        let err = GameAccount::try_from([0u8; 12].as_slice()).unwrap_err();
        assert_eq!(err, InvalidGameAccount(12));
    }
}
