//! Events handed to the world, entity, chat, and UI collaborators.
//!
//! The session queues one [`ClientEvent`] per observable effect of a frame, in the order
//! the effects happened. [`ClientEvent::Disconnected`] is the only failure signal.

use crate::protocol::blocks::BlockDefinition;
use crate::protocol::handshake::Capabilities;
use crate::protocol::location::EntityLocationUpdate;
use crate::protocol::map_transfer::LoadedMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Where a chat line is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Normal,
    Status(u8),
    BottomRight(u8),
    Announcement,
    Other(u8),
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::Normal,
            1..=3 => MessageType::Status(value),
            11..=13 => MessageType::BottomRight(value - 10),
            100 => MessageType::Announcement,
            other => MessageType::Other(other),
        }
    }
}

/// Environment colour slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvColour {
    Sky,
    Clouds,
    Fog,
    Shadow,
    Sun,
}

impl EnvColour {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EnvColour::Sky),
            1 => Some(EnvColour::Clouds),
            2 => Some(EnvColour::Fog),
            3 => Some(EnvColour::Shadow),
            4 => Some(EnvColour::Sun),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weather {
    Sunny,
    Rainy,
    Snowy,
}

impl Weather {
    /// Unknown values mean sunny.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Weather::Rainy,
            2 => Weather::Snowy,
            _ => Weather::Sunny,
        }
    }
}

/// One map environment property, already clamped and scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvProperty {
    SidesBlock(u8),
    EdgeBlock(u8),
    EdgeHeight(i32),
    CloudsHeight(i32),
    MaxViewDistance(i32),
    CloudsSpeed(f32),
    WeatherSpeed(f32),
    WeatherFade(f32),
    ExponentialFog(bool),
    SidesOffset(i32),
    SkyboxHorizontalSpeed(f32),
    SkyboxVerticalSpeed(f32),
}

/// Largest magnitude accepted for any environment property value.
const ENV_VALUE_LIMIT: i32 = 0xFF_FFFF;

/// View distance used when the server sends zero or a negative limit.
pub const UNLIMITED_VIEW_DISTANCE: i32 = 32768;

impl EnvProperty {
    /// Decode a property type and raw value. Unknown types yield `None`.
    pub fn from_wire(kind: u8, value: i32) -> Option<Self> {
        let value = value.clamp(-ENV_VALUE_LIMIT, ENV_VALUE_LIMIT);
        let property = match kind {
            0 => EnvProperty::SidesBlock(value.clamp(0, 255) as u8),
            1 => EnvProperty::EdgeBlock(value.clamp(0, 255) as u8),
            2 => EnvProperty::EdgeHeight(value),
            3 => EnvProperty::CloudsHeight(value),
            4 => EnvProperty::MaxViewDistance(max_view_distance(value.clamp(-0x7FFF, 0x7FFF))),
            5 => EnvProperty::CloudsSpeed(value as f32 / 256.0),
            6 => EnvProperty::WeatherSpeed(value as f32 / 256.0),
            7 => EnvProperty::WeatherFade(value.clamp(0, 255) as f32 / 128.0),
            8 => EnvProperty::ExponentialFog(value != 0),
            9 => EnvProperty::SidesOffset(value),
            10 => EnvProperty::SkyboxHorizontalSpeed(value as f32 / 1024.0),
            11 => EnvProperty::SkyboxVerticalSpeed(value as f32 / 1024.0),
            _ => return None,
        };
        Some(property)
    }
}

pub(crate) fn max_view_distance(value: i32) -> i32 {
    if value <= 0 {
        UNLIMITED_VIEW_DISTANCE
    } else {
        value
    }
}

/// Map appearance as sent by EnvSetMapAppearance. Version 1 frames leave the optional
/// fields empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapAppearance {
    pub side_block: u8,
    pub edge_block: u8,
    pub edge_height: i16,
    pub clouds_height: Option<i16>,
    pub max_view_distance: Option<i32>,
}

/// Movement permissions from HackControl.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HackPermissions {
    pub can_fly: bool,
    pub can_noclip: bool,
    pub can_speed: bool,
    pub can_respawn: bool,
    pub can_third_person: bool,
    /// Jump height in blocks; `None` restores the default.
    pub jump_height: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyAction {
    Remove,
    Set {
        text: String,
        /// The user finishes typing the command before it is sent
        more_input: bool,
    },
}

/// Entity property kinds sent by SetEntityProperty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityPropertyKind {
    RotationX,
    RotationY,
    RotationZ,
    ScaleX,
    ScaleY,
    ScaleZ,
}

impl EntityPropertyKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EntityPropertyKind::RotationX),
            1 => Some(EntityPropertyKind::RotationY),
            2 => Some(EntityPropertyKind::RotationZ),
            3 => Some(EntityPropertyKind::ScaleX),
            4 => Some(EntityPropertyKind::ScaleY),
            5 => Some(EntityPropertyKind::ScaleZ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ServerIdentified {
        protocol_version: u8,
        name: String,
        motd: String,
        user_type: u8,
    },
    PermissionChanged {
        user_type: u8,
    },
    /// Extension reply sent; outgoing packets now use negotiated shapes
    ExtensionsNegotiated(Capabilities),
    NewMapStarting,
    LoadProgress(f32),
    MapReady(LoadedMap),
    BlockChanged {
        x: u16,
        y: u16,
        z: u16,
        block: u8,
    },
    EntityAdded {
        id: u8,
        display_name: String,
        skin_name: String,
        /// The packet also carried a spawn location
        extended: bool,
    },
    EntityRemoved {
        id: u8,
    },
    LocationUpdated {
        id: u8,
        update: EntityLocationUpdate,
        interpolate: bool,
    },
    ModelChanged {
        id: u8,
        model: String,
    },
    PropertyChanged {
        id: u8,
        kind: EntityPropertyKind,
        value: f32,
    },
    Message {
        text: String,
        kind: MessageType,
    },
    BlockDefined(Box<BlockDefinition>),
    BlockUndefined {
        id: u8,
    },
    CustomBlocksEnabled,
    ClickDistance {
        reach: f32,
    },
    HoldBlock {
        block: u8,
        can_change: bool,
    },
    HotkeyChanged {
        label: String,
        key_code: u8,
        modifiers: u8,
        action: HotkeyAction,
    },
    TablistAdded {
        id: u8,
        player_name: String,
        list_name: String,
        group_name: String,
        group_rank: u8,
    },
    TablistRemoved {
        id: u8,
    },
    EnvColourChanged {
        target: EnvColour,
        /// `None` resets to the default colour
        colour: Option<Rgb>,
    },
    SelectionAdded {
        id: u8,
        label: String,
        start: [i16; 3],
        end: [i16; 3],
        colour: Rgba,
    },
    SelectionRemoved {
        id: u8,
    },
    BlockPermissionChanged {
        block: u8,
        can_place: bool,
        can_delete: bool,
    },
    MapAppearanceChanged(MapAppearance),
    WeatherChanged(Weather),
    HacksChanged(HackPermissions),
    TextColourChanged {
        code: u8,
        colour: Rgba,
    },
    /// `None` switches back to the default texture pack
    TexturePackChanged {
        url: Option<String>,
    },
    EnvPropertyChanged(EnvProperty),
    /// Reply to a client-initiated two-way ping
    PingReceived {
        data: u16,
    },
    InventoryOrderChanged {
        block: u8,
        /// `None` removes the block from the inventory
        slot: Option<u8>,
    },
    Disconnected {
        title: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_property_clamps() {
        assert_eq!(EnvProperty::from_wire(0, 1000), Some(EnvProperty::SidesBlock(255)));
        assert_eq!(EnvProperty::from_wire(1, -5), Some(EnvProperty::EdgeBlock(0)));
        assert_eq!(
            EnvProperty::from_wire(2, i32::MAX),
            Some(EnvProperty::EdgeHeight(0xFF_FFFF))
        );
        assert_eq!(
            EnvProperty::from_wire(4, 0),
            Some(EnvProperty::MaxViewDistance(UNLIMITED_VIEW_DISTANCE))
        );
        assert_eq!(
            EnvProperty::from_wire(4, 100_000),
            Some(EnvProperty::MaxViewDistance(0x7FFF))
        );
        assert_eq!(
            EnvProperty::from_wire(7, 512),
            Some(EnvProperty::WeatherFade(255.0 / 128.0))
        );
        assert_eq!(
            EnvProperty::from_wire(10, 2048),
            Some(EnvProperty::SkyboxHorizontalSpeed(2.0))
        );
        assert_eq!(EnvProperty::from_wire(12, 1), None);
    }

    #[test]
    fn test_message_type_mapping() {
        assert_eq!(MessageType::from_u8(0), MessageType::Normal);
        assert_eq!(MessageType::from_u8(2), MessageType::Status(2));
        assert_eq!(MessageType::from_u8(12), MessageType::BottomRight(2));
        assert_eq!(MessageType::from_u8(100), MessageType::Announcement);
        assert_eq!(MessageType::from_u8(255), MessageType::Other(255));
    }
}
