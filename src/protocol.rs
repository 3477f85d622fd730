use serde_json::Value;

use crate::types::{Direction, GhostIdentity};

#[derive(Debug, PartialEq, Eq)]
pub enum ParsedClientMessage {
    CreateRoom,
    JoinRoom {
        room_code: String,
        username: String,
        ghost: GhostIdentity,
    },
    ToggleReady {
        room_code: String,
    },
    StartGame {
        room_code: String,
    },
    RestartGame {
        room_code: String,
    },
    PlayerInput {
        room_code: String,
        direction: Direction,
    },
    RequestGameState {
        room_code: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    InvalidMessage,
    InvalidDirection,
}

impl ProtocolError {
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidMessage => "invalidMessage",
            Self::InvalidDirection => "invalidDirection",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidMessage => "invalid message",
            Self::InvalidDirection => "invalid direction",
        }
    }
}

pub fn parse_client_message(raw: &str) -> Result<ParsedClientMessage, ProtocolError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ProtocolError::InvalidMessage)?;
    let object = value.as_object().ok_or(ProtocolError::InvalidMessage)?;
    let message_type = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::InvalidMessage)?;

    let room_code = |key: &str| -> Result<String, ProtocolError> {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(normalize_room_code)
            .filter(|code| !code.is_empty())
            .ok_or(ProtocolError::InvalidMessage)
    };

    match message_type {
        "createRoom" => Ok(ParsedClientMessage::CreateRoom),
        "joinRoom" => {
            let username = object
                .get("username")
                .and_then(Value::as_str)
                .ok_or(ProtocolError::InvalidMessage)?;
            let ghost = object
                .get("ghostIdentity")
                .and_then(Value::as_str)
                .and_then(GhostIdentity::parse)
                .ok_or(ProtocolError::InvalidMessage)?;
            Ok(ParsedClientMessage::JoinRoom {
                room_code: room_code("roomCode")?,
                username: sanitize_name(username),
                ghost,
            })
        }
        "toggleReady" => Ok(ParsedClientMessage::ToggleReady {
            room_code: room_code("roomCode")?,
        }),
        "startGame" => Ok(ParsedClientMessage::StartGame {
            room_code: room_code("roomCode")?,
        }),
        "restartGame" => Ok(ParsedClientMessage::RestartGame {
            room_code: room_code("roomCode")?,
        }),
        "playerInput" => {
            let direction = object
                .get("direction")
                .and_then(Value::as_str)
                .and_then(Direction::parse_move)
                .ok_or(ProtocolError::InvalidDirection)?;
            Ok(ParsedClientMessage::PlayerInput {
                room_code: room_code("roomCode")?,
                direction,
            })
        }
        "requestGameState" => Ok(ParsedClientMessage::RequestGameState {
            room_code: room_code("roomCode")?,
        }),
        _ => Err(ProtocolError::InvalidMessage),
    }
}

pub fn normalize_room_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(16).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_create_room() {
        assert_eq!(
            parse_client_message(r#"{"type":"createRoom"}"#),
            Ok(ParsedClientMessage::CreateRoom)
        );
    }

    #[test]
    fn parse_join_room() {
        let parsed = parse_client_message(
            r#"{"type":"joinRoom","roomCode":"ab12","username":" Alice ","ghostIdentity":"pinky"}"#,
        )
        .expect("join parses");
        assert_eq!(
            parsed,
            ParsedClientMessage::JoinRoom {
                room_code: "AB12".to_string(),
                username: "Alice".to_string(),
                ghost: GhostIdentity::Pinky,
            }
        );
    }

    #[test]
    fn parse_join_room_rejects_unknown_ghost() {
        let parsed = parse_client_message(
            r#"{"type":"joinRoom","roomCode":"AB12","username":"A","ghostIdentity":"sue"}"#,
        );
        assert_eq!(parsed, Err(ProtocolError::InvalidMessage));
    }

    #[test]
    fn parse_player_input() {
        let parsed =
            parse_client_message(r#"{"type":"playerInput","roomCode":"AB12","direction":"left"}"#)
                .expect("input parses");
        assert_eq!(
            parsed,
            ParsedClientMessage::PlayerInput {
                room_code: "AB12".to_string(),
                direction: Direction::Left,
            }
        );
    }

    #[test]
    fn invalid_direction_has_its_own_error() {
        let parsed =
            parse_client_message(r#"{"type":"playerInput","roomCode":"AB12","direction":"warp"}"#);
        assert_eq!(parsed, Err(ProtocolError::InvalidDirection));
        assert_eq!(ProtocolError::InvalidDirection.code(), "invalidDirection");
    }

    #[test]
    fn missing_room_code_is_invalid() {
        assert_eq!(
            parse_client_message(r#"{"type":"toggleReady"}"#),
            Err(ProtocolError::InvalidMessage)
        );
        assert_eq!(
            parse_client_message(r#"{"type":"toggleReady","roomCode":"  "}"#),
            Err(ProtocolError::InvalidMessage)
        );
    }

    #[test]
    fn unknown_type_is_invalid() {
        assert_eq!(
            parse_client_message(r#"{"type":"fireLasers"}"#),
            Err(ProtocolError::InvalidMessage)
        );
        assert_eq!(
            parse_client_message("not json"),
            Err(ProtocolError::InvalidMessage)
        );
    }

    #[test]
    fn sanitize_name_applies_trim_default_and_cap() {
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(" Bob "), "Bob");
        assert_eq!(sanitize_name("12345678901234567890"), "1234567890123456");
    }
}
