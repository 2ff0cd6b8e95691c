//! Outbound action adapter.
//!
//! Pure mapping from a user-level [`Action`] to the opcode, expected
//! reply shape, and NUL-separated body the server requires. Structured
//! records (dashboards, widgets, devices, reports, apps, tags) stay
//! opaque to the core and are carried as pre-encoded JSON strings.

use serde::Serialize;

use crate::correlator::RequestKind;
use crate::error::{BlynkError, Result};
use crate::protocol::{join_body, Command};

/// OS field sent in LOGIN/SHARE_LOGIN bodies.
pub const CLIENT_OS: &str = "iOS";

/// Protocol version field sent in LOGIN/SHARE_LOGIN bodies.
pub const CLIENT_VERSION: &str = "1.0.0";

/// A user-level operation the controller can send.
///
/// `dash_id`, `device_id` and friends are the server's integer ids;
/// `*_json` fields carry the serialized domain record unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Ping,
    ActivateDashboard { dash_id: i32 },
    /// `dash_id: None` deactivates every active dashboard.
    DeactivateDashboard { dash_id: Option<i32> },
    RefreshToken { dash_id: i32, device_id: i32 },
    /// Hardware write/read micro-command; `fields` are the NUL-joined
    /// text fields after the target (e.g. `["vw", "1", "255"]`).
    Hardware { dash_id: i32, device_id: i32, fields: Vec<String> },
    HardwareSync { dash_id: i32, device_id: i32 },
    SetWidgetProperty {
        dash_id: i32,
        device_id: i32,
        pin: String,
        property: String,
        value: String,
    },
    LoadProfile,
    CreateDashboard { dashboard_json: String },
    UpdateDashboard { dashboard_json: String },
    DeleteDashboard { dash_id: i32 },
    CreateWidget { dash_id: i32, widget_json: String },
    UpdateWidget { dash_id: i32, widget_json: String },
    DeleteWidget { dash_id: i32, widget_id: i64 },
    GetWidget { dash_id: i32, widget_id: i64 },
    CreateDevice { dash_id: i32, device_json: String },
    UpdateDevice { dash_id: i32, device_json: String },
    DeleteDevice { dash_id: i32, device_id: i32 },
    GetDevices { dash_id: i32 },
    MobileGetDevice { dash_id: i32, device_id: i32 },
    DeleteDeviceData { dash_id: i32, device_id: i32 },
    CreateTag { dash_id: i32, tag_json: String },
    UpdateTag { dash_id: i32, tag_json: String },
    DeleteTag { dash_id: i32, tag_id: i64 },
    GetTags { dash_id: i32 },
    CreateApp { app_json: String },
    UpdateApp { app_json: String },
    DeleteApp { app_id: String },
    CreateReport { dash_id: i32, report_json: String },
    UpdateReport { dash_id: i32, report_json: String },
    DeleteReport { dash_id: i32, report_id: i64 },
    ExportReport { dash_id: i32, report_id: i64 },
    CreateTileTemplate { dash_id: i32, template_json: String },
    UpdateTileTemplate { dash_id: i32, template_json: String },
    DeleteTileTemplate { dash_id: i32, template_id: i64 },
    UpdateProjectSettings { dash_id: i32, settings_json: String },
    GetEnergy,
    AddEnergy { amount: i64 },
    AssignToken { dash_id: i32, token: String },
    GetShareToken { dash_id: i32 },
    RefreshShareToken { dash_id: i32 },
    /// Toggle sharing for a dashboard.
    Sharing { dash_id: i32, enabled: bool },
    GetCloneCode { dash_id: i32 },
    GetProjectByCloneCode { token: String },
    GetProvisionToken { dash_id: i32, device_json: String },
    GetEnhancedGraphData { dash_id: i32, widget_id: i64, period: String },
    DeleteEnhancedGraphData { dash_id: i32, widget_id: i64 },
    ExportGraphData { dash_id: i32, widget_id: i64, pin: String },
    AddPushToken { dash_id: i32, uid: String, token: String },
    EmailQr { dash_id: i32 },
    GetServer { email: String, app_name: String },
    Redeem { token: String },
    ResetPassword { email: String, app_name: String },
    Logout,
    /// Escape hatch for catalogue commands without a dedicated variant.
    /// Registered as a plain status-reply request.
    Raw { command: Command, body: Vec<u8> },
}

impl Action {
    /// Opcode this action is sent under.
    pub fn command(&self) -> Command {
        use Action::*;
        match self {
            Ping => Command::Ping,
            ActivateDashboard { .. } => Command::ActivateDashboard,
            DeactivateDashboard { .. } => Command::DeactivateDashboard,
            RefreshToken { .. } => Command::RefreshToken,
            Hardware { .. } => Command::Hardware,
            HardwareSync { .. } => Command::HardwareSync,
            SetWidgetProperty { .. } => Command::SetWidgetProperty,
            LoadProfile => Command::LoadProfileGzipped,
            CreateDashboard { .. } => Command::CreateDash,
            UpdateDashboard { .. } => Command::UpdateDash,
            DeleteDashboard { .. } => Command::DeleteDash,
            CreateWidget { .. } => Command::CreateWidget,
            UpdateWidget { .. } => Command::UpdateWidget,
            DeleteWidget { .. } => Command::DeleteWidget,
            GetWidget { .. } => Command::GetWidget,
            CreateDevice { .. } => Command::CreateDevice,
            UpdateDevice { .. } => Command::UpdateDevice,
            DeleteDevice { .. } => Command::DeleteDevice,
            GetDevices { .. } => Command::GetDevices,
            MobileGetDevice { .. } => Command::MobileGetDevice,
            DeleteDeviceData { .. } => Command::DeleteDeviceData,
            CreateTag { .. } => Command::CreateTag,
            UpdateTag { .. } => Command::UpdateTag,
            DeleteTag { .. } => Command::DeleteTag,
            GetTags { .. } => Command::GetTags,
            CreateApp { .. } => Command::CreateApp,
            UpdateApp { .. } => Command::UpdateApp,
            DeleteApp { .. } => Command::DeleteApp,
            CreateReport { .. } => Command::CreateReport,
            UpdateReport { .. } => Command::UpdateReport,
            DeleteReport { .. } => Command::DeleteReport,
            ExportReport { .. } => Command::ExportReport,
            CreateTileTemplate { .. } => Command::CreateTileTemplate,
            UpdateTileTemplate { .. } => Command::UpdateTileTemplate,
            DeleteTileTemplate { .. } => Command::DeleteTileTemplate,
            UpdateProjectSettings { .. } => Command::UpdateProjectSettings,
            GetEnergy => Command::GetEnergy,
            AddEnergy { .. } => Command::AddEnergy,
            AssignToken { .. } => Command::AssignToken,
            GetShareToken { .. } => Command::GetShareToken,
            RefreshShareToken { .. } => Command::RefreshShareToken,
            Sharing { .. } => Command::Sharing,
            GetCloneCode { .. } => Command::GetCloneCode,
            GetProjectByCloneCode { .. } => Command::GetProjectByCloneCode,
            GetProvisionToken { .. } => Command::GetProvisionToken,
            GetEnhancedGraphData { .. } => Command::GetEnhancedGraphData,
            DeleteEnhancedGraphData { .. } => Command::DeleteEnhancedGraphData,
            ExportGraphData { .. } => Command::ExportGraphData,
            AddPushToken { .. } => Command::AddPushToken,
            EmailQr { .. } => Command::EmailQr,
            GetServer { .. } => Command::GetServer,
            Redeem { .. } => Command::Redeem,
            ResetPassword { .. } => Command::ResetPassword,
            Logout => Command::Logout,
            Raw { command, .. } => *command,
        }
    }

    /// Reply shape to register for this action.
    ///
    /// Data-returning operations are answered by a command-shaped frame
    /// sharing the request's id; everything else gets a plain RESPONSE.
    pub fn kind(&self) -> RequestKind {
        use Action::*;
        match self {
            LoadProfile
            | GetWidget { .. }
            | GetDevices { .. }
            | MobileGetDevice { .. }
            | GetTags { .. }
            | GetEnergy
            | GetShareToken { .. }
            | RefreshShareToken { .. }
            | GetCloneCode { .. }
            | GetProjectByCloneCode { .. }
            | GetProvisionToken { .. }
            | GetEnhancedGraphData { .. }
            | GetServer { .. } => RequestKind::DataResponse,
            _ => RequestKind::ResponseOnly,
        }
    }

    /// Encode the body for this action.
    pub fn encode_body(&self) -> Vec<u8> {
        use Action::*;
        match self {
            Ping | LoadProfile | GetEnergy | Logout => Vec::new(),
            ActivateDashboard { dash_id } => dash_id.to_string().into_bytes(),
            DeactivateDashboard { dash_id: Some(id) } => id.to_string().into_bytes(),
            DeactivateDashboard { dash_id: None } => Vec::new(),
            RefreshToken { dash_id, device_id } => {
                join_body(&[dash_id.to_string(), device_id.to_string()])
            }
            Hardware {
                dash_id,
                device_id,
                fields,
            } => {
                let mut all = Vec::with_capacity(fields.len() + 1);
                all.push(target(*dash_id, *device_id));
                all.extend(fields.iter().cloned());
                join_body(&all)
            }
            HardwareSync { dash_id, device_id } => {
                target(*dash_id, *device_id).into_bytes()
            }
            SetWidgetProperty {
                dash_id,
                device_id,
                pin,
                property,
                value,
            } => join_body(&[
                target(*dash_id, *device_id),
                pin.clone(),
                property.clone(),
                value.clone(),
            ]),
            CreateDashboard { dashboard_json } | UpdateDashboard { dashboard_json } => {
                dashboard_json.clone().into_bytes()
            }
            DeleteDashboard { dash_id } => dash_id.to_string().into_bytes(),
            CreateWidget { dash_id, widget_json } | UpdateWidget { dash_id, widget_json } => {
                join_body(&[dash_id.to_string(), widget_json.clone()])
            }
            DeleteWidget { dash_id, widget_id } | GetWidget { dash_id, widget_id } => {
                join_body(&[dash_id.to_string(), widget_id.to_string()])
            }
            CreateDevice { dash_id, device_json } | UpdateDevice { dash_id, device_json } => {
                join_body(&[dash_id.to_string(), device_json.clone()])
            }
            DeleteDevice { dash_id, device_id } | MobileGetDevice { dash_id, device_id } => {
                join_body(&[dash_id.to_string(), device_id.to_string()])
            }
            GetDevices { dash_id } | GetTags { dash_id } => dash_id.to_string().into_bytes(),
            DeleteDeviceData { dash_id, device_id } => {
                target(*dash_id, *device_id).into_bytes()
            }
            CreateTag { dash_id, tag_json } | UpdateTag { dash_id, tag_json } => {
                join_body(&[dash_id.to_string(), tag_json.clone()])
            }
            DeleteTag { dash_id, tag_id } => join_body(&[dash_id.to_string(), tag_id.to_string()]),
            CreateApp { app_json } | UpdateApp { app_json } => app_json.clone().into_bytes(),
            DeleteApp { app_id } => app_id.clone().into_bytes(),
            CreateReport { dash_id, report_json } | UpdateReport { dash_id, report_json } => {
                join_body(&[dash_id.to_string(), report_json.clone()])
            }
            DeleteReport { dash_id, report_id } | ExportReport { dash_id, report_id } => {
                join_body(&[dash_id.to_string(), report_id.to_string()])
            }
            CreateTileTemplate { dash_id, template_json }
            | UpdateTileTemplate { dash_id, template_json } => {
                join_body(&[dash_id.to_string(), template_json.clone()])
            }
            DeleteTileTemplate { dash_id, template_id } => {
                join_body(&[dash_id.to_string(), template_id.to_string()])
            }
            UpdateProjectSettings { dash_id, settings_json } => {
                join_body(&[dash_id.to_string(), settings_json.clone()])
            }
            AddEnergy { amount } => amount.to_string().into_bytes(),
            AssignToken { dash_id, token } => join_body(&[dash_id.to_string(), token.clone()]),
            GetShareToken { dash_id }
            | RefreshShareToken { dash_id }
            | GetCloneCode { dash_id }
            | EmailQr { dash_id } => dash_id.to_string().into_bytes(),
            Sharing { dash_id, enabled } => {
                let flag = if *enabled { "on" } else { "off" };
                join_body(&[dash_id.to_string(), flag.to_string()])
            }
            GetProjectByCloneCode { token } | Redeem { token } => token.clone().into_bytes(),
            GetProvisionToken { dash_id, device_json } => {
                join_body(&[dash_id.to_string(), device_json.clone()])
            }
            GetEnhancedGraphData {
                dash_id,
                widget_id,
                period,
            } => join_body(&[dash_id.to_string(), widget_id.to_string(), period.clone()]),
            DeleteEnhancedGraphData { dash_id, widget_id } => {
                join_body(&[dash_id.to_string(), widget_id.to_string()])
            }
            ExportGraphData {
                dash_id,
                widget_id,
                pin,
            } => join_body(&[dash_id.to_string(), widget_id.to_string(), pin.clone()]),
            AddPushToken {
                dash_id,
                uid,
                token,
            } => join_body(&[dash_id.to_string(), uid.clone(), token.clone()]),
            GetServer { email, app_name } => join_body(&[email.clone(), app_name.clone()]),
            ResetPassword { email, app_name } => join_body(&[email.clone(), app_name.clone()]),
            Raw { body, .. } => body.clone(),
        }
    }
}

impl Action {
    /// Serialize a dashboard record into a create action.
    pub fn create_dashboard<T: Serialize>(dashboard: &T) -> Result<Self> {
        Ok(Action::CreateDashboard {
            dashboard_json: to_json(dashboard)?,
        })
    }

    /// Serialize a dashboard record into an update action.
    pub fn update_dashboard<T: Serialize>(dashboard: &T) -> Result<Self> {
        Ok(Action::UpdateDashboard {
            dashboard_json: to_json(dashboard)?,
        })
    }

    /// Serialize a widget record into a create action.
    pub fn create_widget<T: Serialize>(dash_id: i32, widget: &T) -> Result<Self> {
        Ok(Action::CreateWidget {
            dash_id,
            widget_json: to_json(widget)?,
        })
    }

    /// Serialize a widget record into an update action.
    pub fn update_widget<T: Serialize>(dash_id: i32, widget: &T) -> Result<Self> {
        Ok(Action::UpdateWidget {
            dash_id,
            widget_json: to_json(widget)?,
        })
    }

    /// Serialize a device record into a create action.
    pub fn create_device<T: Serialize>(dash_id: i32, device: &T) -> Result<Self> {
        Ok(Action::CreateDevice {
            dash_id,
            device_json: to_json(device)?,
        })
    }

    /// Serialize a device record into an update action.
    pub fn update_device<T: Serialize>(dash_id: i32, device: &T) -> Result<Self> {
        Ok(Action::UpdateDevice {
            dash_id,
            device_json: to_json(device)?,
        })
    }
}

fn to_json<T: Serialize>(record: &T) -> Result<String> {
    serde_json::to_string(record).map_err(|e| BlynkError::Encode(e.to_string()))
}

/// Format the `"dashId-deviceId"` target tuple.
pub(crate) fn target(dash_id: i32, device_id: i32) -> String {
    format!("{dash_id}-{device_id}")
}

/// LOGIN body: `email\0digest\0os\0version\0app_name`.
pub(crate) fn login_body(email: &str, digest: &str, app_name: &str) -> Vec<u8> {
    join_body(&[email, digest, CLIENT_OS, CLIENT_VERSION, app_name])
}

/// SHARE_LOGIN body: `token\0os\0version\0app_name`.
pub(crate) fn share_login_body(token: &str, app_name: &str) -> Vec<u8> {
    join_body(&[token, CLIENT_OS, CLIENT_VERSION, app_name])
}

/// REGISTER body: `email\0digest\0app_name`.
pub(crate) fn register_body(email: &str, digest: &str, app_name: &str) -> Vec<u8> {
    join_body(&[email, digest, app_name])
}
