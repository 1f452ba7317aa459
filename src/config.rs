use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Compatibility variable seeding `analysis.agent_id`
pub const AGENT_ID_ENV: &str = "ROBOT_ID";
/// Compatibility variable seeding `analysis.credential`
pub const CREDENTIAL_ENV: &str = "HF_CV_ROBOT_TOKEN";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RobowatchConfig {
    pub camera: CameraConfig,
    pub encoder: EncoderConfig,
    pub analysis: AnalysisConfig,
    pub pacing: PacingConfig,
    pub presenter: PresenterConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraSource {
    /// V4L2 device through GStreamer
    Device,
    /// Generated test pattern
    Synthetic,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Frame source kind
    #[serde(default = "default_camera_source")]
    pub source: CameraSource,

    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Capture format (MJPG, RGB, YUYV)
    #[serde(default = "default_camera_format")]
    pub format: String,

    /// Full GStreamer pipeline override; must end in an appsink named `sink`
    pub pipeline: Option<String>,

    /// Upper bound on a single frame pull
    #[serde(default = "default_pull_timeout_ms")]
    pub pull_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EncoderConfig {
    /// JPEG quality for raw frames (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    /// MCP endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Remote tool invoked once per frame
    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    /// Name announced in the MCP `initialize` handshake
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Identifier of this agent, echoed back by the service
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// Access token forwarded to the tool
    pub credential: Option<String>,

    /// Bound in seconds on one analysis exchange, handshake through tool
    /// reply (0 disables it)
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// MCP protocol revision sent during initialization
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PacingConfig {
    /// Minimum delay between iterations
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Double the delay after each consecutive failed analysis
    #[serde(default = "default_failure_backoff")]
    pub failure_backoff: bool,

    /// Ceiling for the backed-off delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenterFormat {
    Table,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PresenterConfig {
    #[serde(default = "default_presenter_format")]
    pub format: PresenterFormat,

    /// Emit ANSI styling in table output
    #[serde(default = "default_presenter_color")]
    pub color: bool,
}

impl AnalysisConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl PacingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.interval_ms))
    }
}

impl RobowatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("robowatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let agent_id = std::env::var(AGENT_ID_ENV).unwrap_or_else(|_| default_agent_id());

        let mut builder = Config::builder()
            .set_default("camera.source", "device")?
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.format", default_camera_format())?
            .set_default("camera.pull_timeout_ms", default_pull_timeout_ms())?
            .set_default("encoder.jpeg_quality", default_jpeg_quality() as u64)?
            .set_default("analysis.endpoint", default_endpoint())?
            .set_default("analysis.tool_name", default_tool_name())?
            .set_default("analysis.client_name", default_client_name())?
            .set_default("analysis.agent_id", agent_id)?
            .set_default(
                "analysis.request_timeout_seconds",
                default_request_timeout_seconds(),
            )?
            .set_default("analysis.protocol_version", default_protocol_version())?
            .set_default("pacing.interval_ms", default_interval_ms())?
            .set_default("pacing.failure_backoff", default_failure_backoff())?
            .set_default("pacing.max_backoff_ms", default_max_backoff_ms())?
            .set_default("presenter.format", "table")?
            .set_default("presenter.color", default_presenter_color())?;

        if let Ok(credential) = std::env::var(CREDENTIAL_ENV) {
            builder = builder.set_default("analysis.credential", credential)?;
        }

        let settings = builder
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // ROBOWATCH_ANALYSIS__CREDENTIAL style overrides
            .add_source(
                Environment::with_prefix("ROBOWATCH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: RobowatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        // Debug output of the whole struct would leak the credential
        debug!(
            "Final configuration: camera={:?} encoder={:?} pacing={:?} endpoint={} tool={}",
            config.camera,
            config.encoder,
            config.pacing,
            config.analysis.endpoint,
            config.analysis.tool_name
        );

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if !matches!(
            self.camera.format.to_ascii_uppercase().as_str(),
            "MJPG" | "MJPEG" | "RGB" | "YUYV"
        ) {
            return Err(ConfigError::Message(format!(
                "Unsupported camera format '{}'",
                self.camera.format
            )));
        }

        if self.encoder.jpeg_quality == 0 || self.encoder.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Encoder jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        let endpoint = reqwest::Url::parse(&self.analysis.endpoint).map_err(|e| {
            ConfigError::Message(format!(
                "Invalid analysis endpoint '{}': {}",
                self.analysis.endpoint, e
            ))
        })?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(ConfigError::Message(
                "Analysis endpoint must use http or https".to_string(),
            ));
        }

        if self.analysis.tool_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Analysis tool_name must not be empty".to_string(),
            ));
        }

        match self.analysis.credential.as_deref() {
            Some(credential) if !credential.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Analysis credential is not configured (set analysis.credential, \
                     ROBOWATCH_ANALYSIS__CREDENTIAL or {})",
                    CREDENTIAL_ENV
                )));
            }
        }

        if self.pacing.interval_ms == 0 {
            return Err(ConfigError::Message(
                "Pacing interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Configured credential; `validate` guarantees presence
    pub fn credential(&self) -> &str {
        self.analysis.credential.as_deref().unwrap_or_default()
    }

    /// Render as a TOML document, as printed by `--print-config`
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Dotenv file read at startup unless `--env-file` names another
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Load `KEY=value` lines from `path` into the process environment.
///
/// Variables already set in the environment win. A missing file is not an
/// error; returns whether a file was read.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<bool, ConfigError> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => {
            info!("Loaded environment from {}", path.display());
            Ok(true)
        }
        Err(e) if e.not_found() => {
            debug!("No environment file at {}", path.display());
            Ok(false)
        }
        Err(e) => Err(ConfigError::Message(format!(
            "Failed to read environment file {}: {}",
            path.display(),
            e
        ))),
    }
}

impl Default for RobowatchConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                source: default_camera_source(),
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                format: default_camera_format(),
                pipeline: None,
                pull_timeout_ms: default_pull_timeout_ms(),
            },
            encoder: EncoderConfig {
                jpeg_quality: default_jpeg_quality(),
            },
            analysis: AnalysisConfig {
                endpoint: default_endpoint(),
                tool_name: default_tool_name(),
                client_name: default_client_name(),
                agent_id: default_agent_id(),
                credential: None,
                request_timeout_seconds: default_request_timeout_seconds(),
                protocol_version: default_protocol_version(),
            },
            pacing: PacingConfig {
                interval_ms: default_interval_ms(),
                failure_backoff: default_failure_backoff(),
                max_backoff_ms: default_max_backoff_ms(),
            },
            presenter: PresenterConfig {
                format: default_presenter_format(),
                color: default_presenter_color(),
            },
        }
    }
}

// Default value functions
fn default_camera_source() -> CameraSource {
    CameraSource::Device
}
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_format() -> String {
    "MJPG".to_string()
}
fn default_pull_timeout_ms() -> u64 {
    500
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_endpoint() -> String {
    "https://mcp-1st-birthday-cv-mcp-server.hf.space/gradio_api/mcp/".to_string()
}
fn default_tool_name() -> String {
    "CV_MCP_Server_robot_watch".to_string()
}
fn default_client_name() -> String {
    "CV_MCP_Server".to_string()
}
fn default_agent_id() -> String {
    "Robot_CV".to_string()
}
fn default_request_timeout_seconds() -> u64 {
    30
}
fn default_protocol_version() -> String {
    "2025-03-26".to_string()
}

fn default_interval_ms() -> u64 {
    1000
}
fn default_failure_backoff() -> bool {
    false
}
fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_presenter_format() -> PresenterFormat {
    PresenterFormat::Table
}
fn default_presenter_color() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> RobowatchConfig {
        let mut config = RobowatchConfig::default();
        config.analysis.credential = Some("hf_test_token".to_string());
        config
    }

    #[test]
    fn test_default_config_requires_credential() {
        let config = RobowatchConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("credential"));

        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_blank_credential_rejected() {
        let mut config = valid_config();
        config.analysis.credential = Some("   ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();

        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());
        config.camera.resolution = (640, 480);

        config.encoder.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.encoder.jpeg_quality = 90;

        config.analysis.endpoint = "ftp://example.com/mcp".to_string();
        assert!(config.validate().is_err());
        config.analysis.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
        config.analysis.endpoint = "http://localhost:7860/gradio_api/mcp/".to_string();

        config.pacing.interval_ms = 0;
        assert!(config.validate().is_err());
        config.pacing.interval_ms = 1000;

        config.camera.format = "H264".to_string();
        assert!(config.validate().is_err());
        config.camera.format = "yuyv".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_timeout_zero_disables() {
        let mut config = valid_config();
        assert_eq!(
            config.analysis.request_timeout(),
            Some(Duration::from_secs(30))
        );
        config.analysis.request_timeout_seconds = 0;
        assert_eq!(config.analysis.request_timeout(), None);
    }

    #[test]
    fn test_max_backoff_never_below_interval() {
        let pacing = PacingConfig {
            interval_ms: 5000,
            failure_backoff: true,
            max_backoff_ms: 1000,
        };
        assert_eq!(pacing.max_backoff(), Duration::from_millis(5000));
    }

    #[test]
    fn test_env_file_populates_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# robot settings\nROBOWATCH_TEST_ENV_FILE_MARKER=from_env_file\n",
        )
        .unwrap();

        assert!(load_env_file(&path).unwrap());
        assert_eq!(
            std::env::var("ROBOWATCH_TEST_ENV_FILE_MARKER").unwrap(),
            "from_env_file"
        );
    }

    #[test]
    fn test_env_file_does_not_override_environment() {
        std::env::set_var("ROBOWATCH_TEST_ENV_FILE_PRESET", "from_shell");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "ROBOWATCH_TEST_ENV_FILE_PRESET=from_env_file\n").unwrap();

        load_env_file(&path).unwrap();
        assert_eq!(
            std::env::var("ROBOWATCH_TEST_ENV_FILE_PRESET").unwrap(),
            "from_shell"
        );
    }

    #[test]
    fn test_missing_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!load_env_file(dir.path().join(".env")).unwrap());
    }

    #[test]
    fn test_malformed_env_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "NOT A VALID LINE\n").unwrap();

        assert!(load_env_file(&path).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[camera]
source = "synthetic"
resolution = [320, 240]

[analysis]
agent_id = "R1"
credential = "from_file"
request_timeout_seconds = 5

[pacing]
interval_ms = 250

[presenter]
format = "json"
"#
        )
        .unwrap();

        let config = RobowatchConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.source, CameraSource::Synthetic);
        assert_eq!(config.camera.resolution, (320, 240));
        assert_eq!(config.camera.fps, 30);
        assert_eq!(config.analysis.agent_id, "R1");
        assert_eq!(config.credential(), "from_file");
        assert_eq!(config.analysis.tool_name, "CV_MCP_Server_robot_watch");
        assert_eq!(config.pacing.interval_ms, 250);
        assert_eq!(config.presenter.format, PresenterFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let rendered = valid_config().to_toml().unwrap();
        assert!(rendered.contains("[analysis]"));
        let parsed: RobowatchConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.analysis.agent_id, "Robot_CV");
        assert_eq!(parsed.pacing.interval_ms, 1000);
        assert_eq!(parsed.camera.source, CameraSource::Device);
    }
}
