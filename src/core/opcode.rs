//! Opcode identities and their base frame sizes.
//!
//! A frame size counts the opcode byte itself. Sizes listed here are the Classic/CPE
//! defaults; negotiated extensions may widen some of them at runtime through the
//! [`FrameTable`](crate::protocol::dispatcher::FrameTable).

/// One-byte packet tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Opcode {
    Handshake = 0,
    Ping = 1,
    LevelInit = 2,
    LevelDataChunk = 3,
    LevelFinalise = 4,
    SetBlockClient = 5,
    SetBlock = 6,
    AddEntity = 7,
    EntityTeleport = 8,
    RelPosAndOrientation = 9,
    RelPos = 10,
    Orientation = 11,
    RemoveEntity = 12,
    Message = 13,
    Kick = 14,
    SetPermission = 15,

    ExtInfo = 16,
    ExtEntry = 17,
    SetClickDistance = 18,
    CustomBlockSupportLevel = 19,
    HoldThis = 20,
    SetTextHotkey = 21,
    ExtAddPlayerName = 22,
    ExtAddEntity = 23,
    ExtRemovePlayerName = 24,
    EnvSetColor = 25,
    MakeSelection = 26,
    RemoveSelection = 27,
    SetBlockPermission = 28,
    ChangeModel = 29,
    EnvSetMapAppearance = 30,
    EnvSetWeather = 31,
    HackControl = 32,
    ExtAddEntity2 = 33,
    PlayerClick = 34,
    DefineBlock = 35,
    UndefineBlock = 36,
    DefineBlockExt = 37,
    BulkBlockUpdate = 38,
    SetTextColor = 39,
    SetMapEnvUrl = 40,
    SetMapEnvProperty = 41,
    SetEntityProperty = 42,
    TwoWayPing = 43,
    SetInventoryOrder = 44,
}

impl Opcode {
    /// Every known opcode, in wire order.
    pub const ALL: [Opcode; 45] = [
        Opcode::Handshake,
        Opcode::Ping,
        Opcode::LevelInit,
        Opcode::LevelDataChunk,
        Opcode::LevelFinalise,
        Opcode::SetBlockClient,
        Opcode::SetBlock,
        Opcode::AddEntity,
        Opcode::EntityTeleport,
        Opcode::RelPosAndOrientation,
        Opcode::RelPos,
        Opcode::Orientation,
        Opcode::RemoveEntity,
        Opcode::Message,
        Opcode::Kick,
        Opcode::SetPermission,
        Opcode::ExtInfo,
        Opcode::ExtEntry,
        Opcode::SetClickDistance,
        Opcode::CustomBlockSupportLevel,
        Opcode::HoldThis,
        Opcode::SetTextHotkey,
        Opcode::ExtAddPlayerName,
        Opcode::ExtAddEntity,
        Opcode::ExtRemovePlayerName,
        Opcode::EnvSetColor,
        Opcode::MakeSelection,
        Opcode::RemoveSelection,
        Opcode::SetBlockPermission,
        Opcode::ChangeModel,
        Opcode::EnvSetMapAppearance,
        Opcode::EnvSetWeather,
        Opcode::HackControl,
        Opcode::ExtAddEntity2,
        Opcode::PlayerClick,
        Opcode::DefineBlock,
        Opcode::UndefineBlock,
        Opcode::DefineBlockExt,
        Opcode::BulkBlockUpdate,
        Opcode::SetTextColor,
        Opcode::SetMapEnvUrl,
        Opcode::SetMapEnvProperty,
        Opcode::SetEntityProperty,
        Opcode::TwoWayPing,
        Opcode::SetInventoryOrder,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Frame size before any extension widens it, opcode byte included.
    pub fn base_frame_size(self) -> u16 {
        match self {
            Opcode::Handshake => 131,
            Opcode::Ping => 1,
            Opcode::LevelInit => 1,
            Opcode::LevelDataChunk => 1028,
            Opcode::LevelFinalise => 7,
            Opcode::SetBlockClient => 9,
            Opcode::SetBlock => 8,
            Opcode::AddEntity => 74,
            Opcode::EntityTeleport => 10,
            Opcode::RelPosAndOrientation => 7,
            Opcode::RelPos => 5,
            Opcode::Orientation => 4,
            Opcode::RemoveEntity => 2,
            Opcode::Message => 66,
            Opcode::Kick => 65,
            Opcode::SetPermission => 2,
            Opcode::ExtInfo => 67,
            Opcode::ExtEntry => 69,
            Opcode::SetClickDistance => 3,
            Opcode::CustomBlockSupportLevel => 2,
            Opcode::HoldThis => 3,
            Opcode::SetTextHotkey => 134,
            Opcode::ExtAddPlayerName => 196,
            Opcode::ExtAddEntity => 130,
            Opcode::ExtRemovePlayerName => 3,
            Opcode::EnvSetColor => 8,
            Opcode::MakeSelection => 86,
            Opcode::RemoveSelection => 2,
            Opcode::SetBlockPermission => 4,
            Opcode::ChangeModel => 66,
            Opcode::EnvSetMapAppearance => 69,
            Opcode::EnvSetWeather => 2,
            Opcode::HackControl => 8,
            Opcode::ExtAddEntity2 => 138,
            Opcode::PlayerClick => 15,
            Opcode::DefineBlock => 80,
            Opcode::UndefineBlock => 2,
            Opcode::DefineBlockExt => 85,
            Opcode::BulkBlockUpdate => 1282,
            Opcode::SetTextColor => 6,
            Opcode::SetMapEnvUrl => 65,
            Opcode::SetMapEnvProperty => 6,
            Opcode::SetEntityProperty => 7,
            Opcode::TwoWayPing => 4,
            Opcode::SetInventoryOrder => 3,
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}
