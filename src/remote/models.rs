/// Wire models for the Emby user-management API
///
/// Field names follow the server's PascalCase JSON. Missing fields default,
/// so partial responses still decode.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Remote user record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RemoteUser {
    pub id: String,
    pub name: String,
    pub server_id: String,
    pub has_password: bool,
    pub has_configured_password: bool,
    pub last_login_date: Option<DateTime<Utc>>,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub policy: UserPolicy,
}

impl RemoteUser {
    pub fn password_set(&self) -> bool {
        self.has_password || self.has_configured_password
    }
}

/// Per-user access policy.
///
/// Fields the bot never touches (access schedules, tag filters, excluded
/// folders, ...) are kept in `extra` so a read-modify-write posts them back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserPolicy {
    pub is_administrator: bool,
    pub is_hidden: bool,
    pub is_hidden_remotely: bool,
    pub is_disabled: bool,
    pub max_parental_rating: i32,
    pub blocked_tags: Vec<String>,
    pub enable_user_preference_access: bool,
    pub enable_remote_control_of_other_users: bool,
    pub enable_shared_device_control: bool,
    pub enable_remote_access: bool,
    pub enable_live_tv_management: bool,
    pub enable_live_tv_access: bool,
    pub enable_media_playback: bool,
    pub enable_audio_playback_transcoding: bool,
    pub enable_video_playback_transcoding: bool,
    pub enable_playback_remuxing: bool,
    pub enable_content_deletion: bool,
    pub enable_content_downloading: bool,
    pub enable_subtitle_downloading: bool,
    pub enable_subtitle_management: bool,
    pub enable_sync_transcoding: bool,
    pub enable_media_conversion: bool,
    pub enabled_channels: Vec<String>,
    pub enable_all_channels: bool,
    pub enabled_folders: Vec<String>,
    pub enable_all_folders: bool,
    pub invalid_login_attempt_count: i32,
    pub enable_public_sharing: bool,
    pub remote_client_bitrate_limit: i32,
    pub authentication_provider_id: String,
    pub simultaneous_stream_limit: i32,
    pub enabled_devices: Vec<String>,
    pub enable_all_devices: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserPolicy {
    /// Policy applied to freshly provisioned accounts
    pub fn default_for(max_devices: i64) -> Self {
        Self {
            is_hidden: true,
            is_hidden_remotely: true,
            max_parental_rating: 10,
            enable_user_preference_access: true,
            enable_remote_access: true,
            enable_media_playback: true,
            enable_all_channels: true,
            enable_all_folders: true,
            enable_all_devices: true,
            simultaneous_stream_limit: clamp_limit(max_devices),
            ..Self::default()
        }
    }

    /// Reset everything to the default policy but keep the stream limit.
    /// Unmodelled fields are dropped too.
    pub fn normalized(&self) -> Self {
        Self {
            simultaneous_stream_limit: self.simultaneous_stream_limit,
            ..Self::default_for(0)
        }
    }
}

pub(crate) fn clamp_limit(value: i64) -> i32 {
    value.clamp(0, i32::MAX as i64) as i32
}

/// `POST /Users/New` body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

/// `GET /System/Info`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemInfo {
    pub id: String,
    pub server_name: String,
    pub version: String,
    pub operating_system: String,
    pub has_pending_restart: bool,
    pub has_update_available: bool,
}

/// Active playback session
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SessionInfo {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub device_id: String,
    pub device_name: String,
    pub client: String,
    pub application_version: String,
    pub remote_end_point: String,
    pub now_playing_item: Option<NowPlayingItem>,
    pub play_state: Option<PlayState>,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub transcoding_info: Option<TranscodingInfo>,
}

impl SessionInfo {
    pub fn is_playing(&self) -> bool {
        match (&self.now_playing_item, &self.play_state) {
            (Some(_), Some(state)) => !state.is_paused,
            _ => false,
        }
    }

    /// Playback position as a percentage of runtime
    pub fn progress(&self) -> f64 {
        match (&self.now_playing_item, &self.play_state) {
            (Some(item), Some(state)) if item.run_time_ticks > 0 => {
                state.position_ticks as f64 / item.run_time_ticks as f64 * 100.0
            }
            _ => 0.0,
        }
    }

    pub fn is_transcoding(&self) -> bool {
        self.transcoding_info
            .as_ref()
            .map(|t| !t.is_video_direct || !t.is_audio_direct)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NowPlayingItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub item_type: String,
    pub media_type: String,
    pub run_time_ticks: i64,
    pub series_name: String,
    pub season_name: String,
    pub index_number: i32,
    pub parent_index_number: i32,
    pub production_year: i32,
}

impl NowPlayingItem {
    /// `Series S01E02` for episodes, otherwise the item name
    pub fn display_name(&self) -> String {
        if self.item_type == "Episode" && !self.series_name.is_empty() {
            if self.parent_index_number > 0 && self.index_number > 0 {
                return format!(
                    "{} S{:02}E{:02}",
                    self.series_name, self.parent_index_number, self.index_number
                );
            }
            return format!("{} - {}", self.series_name, self.name);
        }
        self.name.clone()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PlayState {
    pub position_ticks: i64,
    pub can_seek: bool,
    pub is_paused: bool,
    pub is_muted: bool,
    pub play_method: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TranscodingInfo {
    pub is_video_direct: bool,
    pub is_audio_direct: bool,
    pub video_codec: String,
    pub audio_codec: String,
    pub container: String,
    pub bitrate: i64,
    pub completion_percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_user_with_policy() {
        let json = r#"{
            "Id": "abc123",
            "Name": "alice",
            "HasPassword": true,
            "Policy": {"IsDisabled": true, "SimultaneousStreamLimit": 2, "Unknown": 1}
        }"#;
        let user: RemoteUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "abc123");
        assert!(user.password_set());
        assert!(user.policy.is_disabled);
        assert_eq!(user.policy.simultaneous_stream_limit, 2);
    }

    #[test]
    fn test_default_policy() {
        let policy = UserPolicy::default_for(3);
        assert_eq!(policy.max_parental_rating, 10);
        assert_eq!(policy.simultaneous_stream_limit, 3);
        assert!(policy.is_hidden && policy.enable_remote_access && policy.enable_media_playback);
        assert!(!policy.is_administrator && !policy.is_disabled);

        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["SimultaneousStreamLimit"], 3);
        assert_eq!(json["EnableAllFolders"], true);
    }

    #[test]
    fn test_unmodelled_policy_fields_survive_round_trip() {
        let json = r#"{
            "IsDisabled": false,
            "SimultaneousStreamLimit": 2,
            "BlockUnratedItems": ["Movie"],
            "AccessSchedules": [{"DayOfWeek": "Sunday", "StartHour": 8.0, "EndHour": 20.0}],
            "ExcludedSubFolders": ["lib_1"],
            "IncludeTags": ["kids"],
            "AllowTagOrRating": true
        }"#;
        let mut policy: UserPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.extra.len(), 5);

        policy.is_disabled = true;
        let out = serde_json::to_value(&policy).unwrap();
        assert_eq!(out["IsDisabled"], true);
        assert_eq!(out["SimultaneousStreamLimit"], 2);
        assert_eq!(out["BlockUnratedItems"][0], "Movie");
        assert_eq!(out["AccessSchedules"][0]["DayOfWeek"], "Sunday");
        assert_eq!(out["ExcludedSubFolders"][0], "lib_1");
        assert_eq!(out["IncludeTags"][0], "kids");
        assert_eq!(out["AllowTagOrRating"], true);
    }

    #[test]
    fn test_normalized_keeps_stream_limit() {
        let mut policy = UserPolicy::default_for(5);
        policy.enable_content_deletion = true;
        policy.max_parental_rating = 18;
        policy
            .extra
            .insert("IncludeTags".to_string(), serde_json::json!(["kids"]));

        let normalized = policy.normalized();
        assert_eq!(normalized.simultaneous_stream_limit, 5);
        assert!(!normalized.enable_content_deletion);
        assert_eq!(normalized.max_parental_rating, 10);
        assert!(normalized.extra.is_empty());
    }

    #[test]
    fn test_episode_display_name_and_progress() {
        let session = SessionInfo {
            now_playing_item: Some(NowPlayingItem {
                name: "Pilot".to_string(),
                item_type: "Episode".to_string(),
                series_name: "Show".to_string(),
                parent_index_number: 1,
                index_number: 2,
                run_time_ticks: 1000,
                ..Default::default()
            }),
            play_state: Some(PlayState {
                position_ticks: 250,
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(session.is_playing());
        assert!((session.progress() - 25.0).abs() < f64::EPSILON);
        let item = session.now_playing_item.as_ref().unwrap();
        assert_eq!(item.display_name(), "Show S01E02");
    }

    #[test]
    fn test_paused_session_is_not_playing() {
        let session = SessionInfo {
            now_playing_item: Some(NowPlayingItem::default()),
            play_state: Some(PlayState {
                is_paused: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!session.is_playing());
        assert_eq!(session.progress(), 0.0);
    }
}
