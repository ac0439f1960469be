// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for one flockstep drone node, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Node identity and swarm role
// - Coordinator discovery and transport ports
// - Music server, script location and flight safety switch

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "flockstep/v1";
pub const KIND: &str = "NodeConfig";

pub const DEFAULT_TRANSPORT_PORT: u16 = 2339;
pub const DEFAULT_ANNOUNCE_PORT: u16 = 8993;
pub const DEFAULT_MUSIC_PORT: u16 = 4212;
pub const MUSIC_DISABLED: &str = "none";
pub const TRACK_INDEX_PLACEHOLDER: &str = "{n}";

/// Top-level Kubernetes-style node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigManifest {
    /// API version (must be "flockstep/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NodeConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: NodeConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Node configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfigSpec {
    #[serde(default)]
    pub node: NodeIdentity,

    #[serde(default)]
    pub swarm: SwarmConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub music: MusicConfig,

    #[serde(default)]
    pub choreography: ChoreographyConfig,

    #[serde(default)]
    pub flight: FlightConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Id sent in LOGIN; also selects `dance_<id>.txt`
    pub drone_id: i32,

    #[serde(default)]
    pub role: NodeRole,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            drone_id: 0,
            role: NodeRole::Follower,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Coordinator,
    #[default]
    Follower,
}

impl std::str::FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coordinator" => Ok(NodeRole::Coordinator),
            "follower" => Ok(NodeRole::Follower),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Drones in the show, coordinator included
    #[serde(default = "default_expected_drones")]
    pub expected_drones: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            expected_drones: default_expected_drones(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatorDiscovery {
    /// Listen for `MASTER_IP:` UDP announcements
    #[default]
    Broadcast,
    /// Use the default IPv4 gateway (coordinator runs the hotspot)
    Gateway,
    /// Use `coordinator_address`
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub coordinator_discovery: CoordinatorDiscovery,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator_address: Option<Ipv4Addr>,

    #[serde(default = "default_transport_port")]
    pub transport_port: u16,

    #[serde(default = "default_announce_port")]
    pub announce_port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Address put into announcements; detected from the routing table when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_address: Option<Ipv4Addr>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            coordinator_discovery: CoordinatorDiscovery::default(),
            coordinator_address: None,
            transport_port: default_transport_port(),
            announce_port: default_announce_port(),
            bind_address: default_bind_address(),
            advertise_address: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicConfig {
    /// Dotted quad, or "none" to start the clock without music
    #[serde(default = "default_music_server")]
    pub server_address: String,

    #[serde(default = "default_music_port")]
    pub port: u16,

    /// Track file name; `{n}` is replaced by the dance index + 1
    #[serde(default = "default_track_template")]
    pub track_template: String,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            server_address: default_music_server(),
            port: default_music_port(),
            track_template: default_track_template(),
        }
    }
}

impl MusicConfig {
    /// `None` when music is disabled or the address does not parse.
    pub fn server(&self) -> Option<Ipv4Addr> {
        if self.server_address.eq_ignore_ascii_case(MUSIC_DISABLED) {
            return None;
        }
        self.server_address.parse().ok()
    }

    pub fn track_name(&self, dance_index: u8) -> String {
        self.track_template
            .replace(TRACK_INDEX_PLACEHOLDER, &(dance_index as u32 + 1).to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreographyConfig {
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,

    /// Every drone loads dance_0.txt
    #[serde(default)]
    pub practice_run: bool,
}

impl Default for ChoreographyConfig {
    fn default() -> Self {
        Self {
            script_dir: default_script_dir(),
            practice_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightConfig {
    /// Master switch for TAKEOFF, LAND, POS and FLY
    #[serde(default = "default_true")]
    pub flying_allowed: bool,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self { flying_allowed: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_expected_drones() -> usize {
    1
}

fn default_transport_port() -> u16 {
    DEFAULT_TRANSPORT_PORT
}

fn default_announce_port() -> u16 {
    DEFAULT_ANNOUNCE_PORT
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_music_server() -> String {
    MUSIC_DISABLED.to_string()
}

fn default_music_port() -> u16 {
    DEFAULT_MUSIC_PORT
}

fn default_track_template() -> String {
    "tanec{n}.mp3".to_string()
}

fn default_script_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for NodeConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "flockstep-node".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

impl NodeConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. FLOCKSTEP_CONFIG_PATH environment variable
    /// 2. ./flockstep-config.yaml (working directory)
    /// 3. ~/.flockstep/config.yaml (user home)
    /// 4. /etc/flockstep/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FLOCKSTEP_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./flockstep-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".flockstep").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/flockstep/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; invalid values are logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("FLOCKSTEP_DRONE_ID") {
            match val.trim().parse::<i32>() {
                Ok(id) => {
                    tracing::info!("Environment override: FLOCKSTEP_DRONE_ID={}", id);
                    self.spec.node.drone_id = id;
                }
                Err(_) => tracing::warn!("Invalid value for FLOCKSTEP_DRONE_ID: '{}'. Ignoring.", val),
            }
        }

        if let Some(val) = lookup("FLOCKSTEP_ROLE") {
            match val.trim().parse::<NodeRole>() {
                Ok(role) => {
                    tracing::info!("Environment override: FLOCKSTEP_ROLE={:?}", role);
                    self.spec.node.role = role;
                }
                Err(e) => tracing::warn!("Invalid value for FLOCKSTEP_ROLE: {}. Ignoring.", e),
            }
        }

        if let Some(val) = lookup("FLOCKSTEP_EXPECTED_DRONES") {
            match val.trim().parse::<usize>() {
                Ok(count) => {
                    tracing::info!("Environment override: FLOCKSTEP_EXPECTED_DRONES={}", count);
                    self.spec.swarm.expected_drones = count;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for FLOCKSTEP_EXPECTED_DRONES: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("FLOCKSTEP_MUSIC_SERVER") {
            tracing::info!("Environment override: FLOCKSTEP_MUSIC_SERVER={}", val);
            self.spec.music.server_address = val.trim().to_string();
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.spec.node.role == NodeRole::Coordinator
    }

    /// Coordinator with nobody to wait for: no server, no announcements.
    pub fn runs_solo(&self) -> bool {
        self.is_coordinator() && self.spec.swarm.expected_drones <= 1
    }

    /// Followers that must log in before START goes out.
    pub fn quorum(&self) -> usize {
        self.spec.swarm.expected_drones.saturating_sub(1)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.node.drone_id < 0 {
            anyhow::bail!("spec.node.drone_id cannot be negative: {}", self.spec.node.drone_id);
        }

        if self.spec.swarm.expected_drones == 0 {
            anyhow::bail!("spec.swarm.expected_drones must be at least 1");
        }

        let network = &self.spec.network;
        if network.transport_port == 0 || network.announce_port == 0 {
            anyhow::bail!("spec.network ports cannot be 0");
        }
        if network.coordinator_discovery == CoordinatorDiscovery::Static
            && network.coordinator_address.is_none()
            && !self.is_coordinator()
        {
            anyhow::bail!("spec.network.coordinator_address is required for static discovery");
        }

        let music = &self.spec.music;
        if !music.server_address.eq_ignore_ascii_case(MUSIC_DISABLED)
            && music.server_address.parse::<Ipv4Addr>().is_err()
        {
            anyhow::bail!(
                "spec.music.server_address must be an IPv4 address or '{}', got '{}'",
                MUSIC_DISABLED,
                music.server_address
            );
        }
        if !music.track_template.contains(TRACK_INDEX_PLACEHOLDER) {
            anyhow::bail!(
                "spec.music.track_template must contain '{}': '{}'",
                TRACK_INDEX_PLACEHOLDER,
                music.track_template
            );
        }

        Ok(())
    }
}
