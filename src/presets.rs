//! Canned conversation starters bound to fixed UI actions.
//!
//! Each preset maps a button (or slash command) to a literal templated
//! question; the assistant sees them as ordinary user messages.

/// A fixed starter prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    OnePlayer,
    TwoPlayers,
    ThreePlayers,
    FourPlayers,
    FivePlayers,
    SixPlayers,
    SevenPlusPlayers,
    Teach,
    Unsure,
    Shuffle,
}

impl Preset {
    pub const ALL: [Preset; 10] = [
        Preset::OnePlayer,
        Preset::TwoPlayers,
        Preset::ThreePlayers,
        Preset::FourPlayers,
        Preset::FivePlayers,
        Preset::SixPlayers,
        Preset::SevenPlusPlayers,
        Preset::Teach,
        Preset::Unsure,
        Preset::Shuffle,
    ];

    /// The exact user message this preset submits.
    pub fn prompt(self) -> &'static str {
        match self {
            Preset::OnePlayer => {
                "What are some of your top rated games for only 1 player; \
                 especially if the best player count is 1?"
            }
            Preset::TwoPlayers => {
                "What are some of your top rated games for only 2 players; \
                 especially if the best player count is 2?"
            }
            Preset::ThreePlayers => {
                "What are some of your top rated games for 3 players; \
                 especially if the best player count is 3?"
            }
            Preset::FourPlayers => {
                "What are some of your top rated games for 4 players; \
                 especially if the best player count is 4?"
            }
            Preset::FivePlayers => {
                "What are some of your top rated games for 5 players; \
                 especially if the best player count is 5?"
            }
            Preset::SixPlayers => {
                "What are some of your top rated games for 6 players; \
                 especially if the best player count is 6?"
            }
            Preset::SevenPlusPlayers => {
                "What are some of your top rated games for 7 or more players; \
                 especially if the best player count is 7 or more?"
            }
            Preset::Teach => {
                "I'm not super familiar with board game terminology, so I'm not sure \
                 how to ask you for recommendations. Could you tell me a bit about a \
                 few types of board games?"
            }
            Preset::Unsure => {
                "I'm a bit unsure how to start because I'm a bit new to board games. \
                 Could you help me figure out how where to start?"
            }
            Preset::Shuffle => {
                "Surprise me! With equal odds for every game in the library, could \
                 you randomly pick 5 games and give them to me?"
            }
        }
    }

    /// Slash-command name (without the leading slash).
    pub fn command(self) -> &'static str {
        match self {
            Preset::OnePlayer => "1",
            Preset::TwoPlayers => "2",
            Preset::ThreePlayers => "3",
            Preset::FourPlayers => "4",
            Preset::FivePlayers => "5",
            Preset::SixPlayers => "6",
            Preset::SevenPlusPlayers => "7",
            Preset::Teach => "teach",
            Preset::Unsure => "unsure",
            Preset::Shuffle => "shuffle",
        }
    }

    /// Short label for menus.
    pub fn label(self) -> &'static str {
        match self {
            Preset::OnePlayer => "1 Player",
            Preset::TwoPlayers => "2 Players",
            Preset::ThreePlayers => "3 Players",
            Preset::FourPlayers => "4 Players",
            Preset::FivePlayers => "5 Players",
            Preset::SixPlayers => "6 Players",
            Preset::SevenPlusPlayers => "7+ Players",
            Preset::Teach => "Teach me about board games",
            Preset::Unsure => "I'm not sure where to start",
            Preset::Shuffle => "Shuffle and deal me",
        }
    }

    pub fn from_command(command: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.command() == command)
    }
}
