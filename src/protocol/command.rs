//! Protocol opcode catalogue.
//!
//! Every message carries a one-byte command code. `RESPONSE` (0) is the
//! sentinel for status replies; all other codes name an operation or a
//! server-originated notification.

/// Protocol command codes (mobile catalogue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Status reply; the length field carries a response code instead.
    Response = 0,
    Register = 1,
    Login = 2,
    Redeem = 3,
    HardwareConnected = 4,
    Ping = 6,
    ActivateDashboard = 7,
    DeactivateDashboard = 8,
    RefreshToken = 9,
    HardwareSync = 16,
    Internal = 17,
    SetWidgetProperty = 19,
    Hardware = 20,
    CreateDash = 21,
    UpdateDash = 22,
    DeleteDash = 23,
    LoadProfileGzipped = 24,
    AppSync = 25,
    Sharing = 26,
    AddPushToken = 27,
    ExportGraphData = 28,
    GetShareToken = 30,
    RefreshShareToken = 31,
    ShareLogin = 32,
    CreateWidget = 33,
    UpdateWidget = 34,
    DeleteWidget = 35,
    GetEnergy = 36,
    AddEnergy = 37,
    UpdateProjectSettings = 38,
    AssignToken = 39,
    GetServer = 40,
    CreateDevice = 42,
    UpdateDevice = 43,
    DeleteDevice = 44,
    GetDevices = 45,
    CreateTag = 46,
    UpdateTag = 47,
    DeleteTag = 48,
    GetTags = 49,
    MobileGetDevice = 50,
    CreateApp = 55,
    UpdateApp = 56,
    DeleteApp = 57,
    EmailQr = 59,
    GetEnhancedGraphData = 60,
    DeleteEnhancedGraphData = 61,
    GetCloneCode = 62,
    GetProjectByCloneCode = 63,
    HardwareResendFromBluetooth = 65,
    Logout = 66,
    CreateTileTemplate = 67,
    UpdateTileTemplate = 68,
    DeleteTileTemplate = 69,
    GetWidget = 70,
    DeviceOffline = 71,
    OutdatedAppNotification = 72,
    GetProvisionToken = 74,
    DeleteDeviceData = 76,
    CreateReport = 77,
    UpdateReport = 78,
    DeleteReport = 79,
    ExportReport = 80,
    ResetPassword = 81,
}

impl Command {
    /// Wire code of this command.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look up a command by its wire code.
    ///
    /// Returns `None` for codes outside the catalogue; the parser drops
    /// such frames silently.
    pub fn from_u8(code: u8) -> Option<Self> {
        use Command::*;
        Some(match code {
            0 => Response,
            1 => Register,
            2 => Login,
            3 => Redeem,
            4 => HardwareConnected,
            6 => Ping,
            7 => ActivateDashboard,
            8 => DeactivateDashboard,
            9 => RefreshToken,
            16 => HardwareSync,
            17 => Internal,
            19 => SetWidgetProperty,
            20 => Hardware,
            21 => CreateDash,
            22 => UpdateDash,
            23 => DeleteDash,
            24 => LoadProfileGzipped,
            25 => AppSync,
            26 => Sharing,
            27 => AddPushToken,
            28 => ExportGraphData,
            30 => GetShareToken,
            31 => RefreshShareToken,
            32 => ShareLogin,
            33 => CreateWidget,
            34 => UpdateWidget,
            35 => DeleteWidget,
            36 => GetEnergy,
            37 => AddEnergy,
            38 => UpdateProjectSettings,
            39 => AssignToken,
            40 => GetServer,
            42 => CreateDevice,
            43 => UpdateDevice,
            44 => DeleteDevice,
            45 => GetDevices,
            46 => CreateTag,
            47 => UpdateTag,
            48 => DeleteTag,
            49 => GetTags,
            50 => MobileGetDevice,
            55 => CreateApp,
            56 => UpdateApp,
            57 => DeleteApp,
            59 => EmailQr,
            60 => GetEnhancedGraphData,
            61 => DeleteEnhancedGraphData,
            62 => GetCloneCode,
            63 => GetProjectByCloneCode,
            65 => HardwareResendFromBluetooth,
            66 => Logout,
            67 => CreateTileTemplate,
            68 => UpdateTileTemplate,
            69 => DeleteTileTemplate,
            70 => GetWidget,
            71 => DeviceOffline,
            72 => OutdatedAppNotification,
            74 => GetProvisionToken,
            76 => DeleteDeviceData,
            77 => CreateReport,
            78 => UpdateReport,
            79 => DeleteReport,
            80 => ExportReport,
            81 => ResetPassword,
            _ => return None,
        })
    }
}
