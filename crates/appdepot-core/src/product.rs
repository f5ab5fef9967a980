//! Product records and the repository index line format
//!
//! A `ProductRecord` is one installable product: an app or a plugin, with
//! enough metadata to decide whether it can run on this host and whether a
//! newer revision is available. Records are read from plain-text index files
//! (one record per comma-delimited line) in either a minimal 4-column form or
//! the full 12 to 19 column form, and written back in a canonical 13-column
//! encoding.

use crate::hashing::sha256_file;
use crate::host::{strip_api_version, PackageHost, PackageMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Field delimiter in index lines
pub const DELIMITER: char = ',';

/// URI prefix marking an already-absolute filesystem path
pub const FILE_PREFIX: &str = "file:";

/// Sentinel for "package is not installed"
pub const NOT_INSTALLED: i32 = -1;

/// Sentinel for "artifact size unknown"
pub const UNKNOWN_FILE_SIZE: i64 = -1;

/// Default revision when the index carries an unparseable value
const DEFAULT_REVISION: i32 = 1;

/// Default minimum OS API level when the index carries an unparseable value
const DEFAULT_OS_REQUIREMENT: i32 = 21;

/// Package-name prefixes reserved for system plugins
const SYSTEM_PLUGIN_PREFIXES: [&str; 2] =
    ["com.atakmap.app.flavor.", "com.atakmap.app.encryption."];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Platform {
    Android,
    Windows,
    #[serde(rename = "iOS")]
    Ios,
}

impl Platform {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Android" => Some(Self::Android),
            "Windows" => Some(Self::Windows),
            "iOS" => Some(Self::Ios),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Android => write!(f, "Android"),
            Self::Windows => write!(f, "Windows"),
            Self::Ios => write!(f, "iOS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    App,
    Plugin,
    /// Plugin whose package name matches a reserved system prefix
    SystemPlugin,
}

impl ProductType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "app" => Some(Self::App),
            "plugin" => Some(Self::Plugin),
            "systemplugin" => Some(Self::SystemPlugin),
            _ => None,
        }
    }

    /// Refine `plugin` to `systemplugin` when the package name is reserved
    pub fn specialize(self, package_name: &str) -> Self {
        if self == Self::Plugin
            && SYSTEM_PLUGIN_PREFIXES
                .iter()
                .any(|p| package_name.starts_with(p))
        {
            Self::SystemPlugin
        } else {
            self
        }
    }

    pub fn is_plugin(self) -> bool {
        matches!(self, Self::Plugin | Self::SystemPlugin)
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App => write!(f, "app"),
            Self::Plugin => write!(f, "plugin"),
            Self::SystemPlugin => write!(f, "systemplugin"),
        }
    }
}

/// One installable product as described by a repository index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub platform: Platform,
    pub product_type: ProductType,
    pub package_name: String,
    /// Display label
    pub simple_name: String,
    pub version: Option<String>,
    /// Monotonic build number
    pub revision: i32,
    /// Artifact locator, absolute or relative to the index
    pub app_uri: Option<String>,
    pub icon_uri: Option<String>,
    pub description: Option<String>,
    /// SHA-256 of the artifact, hex
    pub hash: Option<String>,
    /// Minimum OS API level
    pub os_requirement: i32,
    /// Plugin-API requirement string; empty or absent means unconstrained
    pub tak_requirement: Option<String>,
    /// Installed version code, or `NOT_INSTALLED`
    pub installed_version: i32,
    /// Artifact size in bytes, or `UNKNOWN_FILE_SIZE`
    pub file_size: i64,
    /// Index path of the repository this record came from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_key: Option<String>,
}

/// Equality and hashing are by package name alone. Records for the same
/// package from different repositories collide deliberately; dedup across
/// repositories depends on it.
impl PartialEq for ProductRecord {
    fn eq(&self, other: &Self) -> bool {
        self.package_name == other.package_name
    }
}

impl Eq for ProductRecord {}

impl Hash for ProductRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.package_name.hash(state);
    }
}

impl fmt::Display for ProductRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) r{} [{}]",
            self.simple_name, self.package_name, self.revision, self.product_type
        )
    }
}

fn parse_i32_or(field: &str, default: i32) -> i32 {
    match field.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            debug!("Unparseable numeric field '{}', using {}", field, default);
            default
        }
    }
}

fn non_empty(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Replace the field delimiter before writing. Lossy on purpose; a comma
/// inside a field would corrupt the column count on reload.
fn sanitize(field: &str) -> String {
    field.replace(DELIMITER, " ")
}

impl ProductRecord {
    /// Minimal record carrying only identity fields
    pub fn minimal(
        package_name: impl Into<String>,
        simple_name: impl Into<String>,
        revision: i32,
    ) -> Self {
        let package_name = package_name.into();
        let product_type = ProductType::Plugin.specialize(&package_name);
        Self {
            platform: Platform::Android,
            product_type,
            package_name,
            simple_name: simple_name.into(),
            version: None,
            revision,
            app_uri: None,
            icon_uri: None,
            description: None,
            hash: None,
            os_requirement: 1,
            tak_requirement: None,
            installed_version: NOT_INSTALLED,
            file_size: UNKNOWN_FILE_SIZE,
            repo_key: None,
        }
    }

    /// Parse one index line. Returns None when the line does not describe a
    /// product this host could ever carry: wrong column count, wrong
    /// platform, or a record failing the validity rule.
    ///
    /// Two layouts are accepted:
    /// - 4 columns: `packageName,simpleName,revision,appUri`
    /// - 12 to 19 columns:
    ///   `platform,productType,packageName,simpleName,version,revision,appUri,iconUri,description,hash,osRequirement,takRequirement[,fileSize[,...]]`
    pub fn from_index_line(
        line: &str,
        repo_key: Option<&str>,
        host: &dyn PackageHost,
    ) -> Option<Self> {
        let fields: Vec<&str> = line.split(DELIMITER).collect();

        let mut record = match fields.len() {
            4 => {
                let package_name = non_empty(fields[0])?;
                let simple_name = non_empty(fields[1])?;
                let mut record = Self::minimal(
                    package_name,
                    simple_name,
                    parse_i32_or(fields[2], DEFAULT_REVISION),
                );
                record.app_uri = non_empty(fields[3]);
                record
            }
            12..=19 => {
                let platform = match Platform::parse(fields[0].trim()) {
                    Some(Platform::Android) => Platform::Android,
                    _ => {
                        debug!("Skipping record for platform '{}'", fields[0]);
                        return None;
                    }
                };
                let package_name = non_empty(fields[2])?;
                let product_type =
                    ProductType::parse(fields[1].trim())?.specialize(&package_name);

                // Apps are not plugin-API gated; pin their requirement to
                // the running host's baseline.
                let tak_requirement = if product_type == ProductType::App {
                    Some(host.host_api().to_string())
                } else {
                    non_empty(fields[11])
                };

                let file_size = if fields.len() > 12 {
                    fields[12].trim().parse().ok()?
                } else {
                    UNKNOWN_FILE_SIZE
                };
                if fields.len() > 13 {
                    debug!("Ignoring {} extra columns for {}", fields.len() - 13, package_name);
                }

                Self {
                    platform,
                    product_type,
                    package_name,
                    simple_name: non_empty(fields[3])?,
                    version: non_empty(fields[4]),
                    revision: parse_i32_or(fields[5], DEFAULT_REVISION),
                    app_uri: non_empty(fields[6]),
                    icon_uri: non_empty(fields[7]),
                    description: non_empty(fields[8]),
                    hash: non_empty(fields[9]),
                    os_requirement: parse_i32_or(fields[10], DEFAULT_OS_REQUIREMENT),
                    tak_requirement,
                    installed_version: NOT_INSTALLED,
                    file_size,
                    repo_key: None,
                }
            }
            n => {
                warn!("Invalid column length {}: {}", n, line);
                return None;
            }
        };

        record.repo_key = repo_key.map(|k| k.to_string());
        record.installed_version = host
            .installed_version(&record.package_name)
            .unwrap_or(NOT_INSTALLED);

        if record.is_valid(host) {
            Some(record)
        } else {
            warn!("Dropping invalid record {}", record.package_name);
            None
        }
    }

    /// Canonical 13-column encoding of this record
    pub fn to_index_line(&self) -> String {
        let opt = |o: &Option<String>| o.as_deref().map(sanitize).unwrap_or_default();
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.platform,
            self.product_type,
            sanitize(&self.package_name),
            sanitize(&self.simple_name),
            opt(&self.version),
            self.revision,
            opt(&self.app_uri),
            opt(&self.icon_uri),
            opt(&self.description),
            opt(&self.hash),
            self.os_requirement,
            opt(&self.tak_requirement),
            self.file_size,
        )
    }

    /// Derive a record from an installable artifact on disk. The display
    /// label falls back through manifest label, non-localized label, loaded
    /// label, and finally the package name. The icon, when the manifest
    /// carries one, is written beside the artifact (or into `fallback_dir`
    /// when that fails).
    pub fn from_package_file(
        repo_key: Option<&str>,
        file: &Path,
        fallback_dir: &Path,
        host: &dyn PackageHost,
    ) -> Option<Self> {
        let meta = host.inspect_package(file)?;
        if meta.package_name.is_empty() {
            return None;
        }

        let label = Self::pick_label(&meta);
        let is_plugin =
            meta.plugin_api.is_some() && meta.package_name != host.host_package();
        let product_type = if is_plugin {
            ProductType::Plugin.specialize(&meta.package_name)
        } else {
            ProductType::App
        };

        let hash = match sha256_file(file) {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("Failed to hash {}: {}", file.display(), e);
                None
            }
        };

        let icon_uri = meta
            .icon_png
            .as_deref()
            .and_then(|png| Self::extract_icon(&meta.package_name, png, file, fallback_dir));

        let file_size = if meta.file_size > 0 {
            meta.file_size
        } else {
            std::fs::metadata(file)
                .map(|m| m.len() as i64)
                .unwrap_or(UNKNOWN_FILE_SIZE)
        };

        let tak_requirement = if product_type == ProductType::App {
            Some(host.host_api().to_string())
        } else {
            meta.plugin_api.clone()
        };

        let mut record = Self {
            platform: Platform::Android,
            product_type,
            package_name: meta.package_name.clone(),
            simple_name: label,
            version: meta.version_name.clone(),
            revision: meta.version_code,
            app_uri: Some(format!("{}{}", FILE_PREFIX, file.display())),
            icon_uri,
            description: meta.description.clone(),
            hash,
            os_requirement: 1,
            tak_requirement,
            installed_version: NOT_INSTALLED,
            file_size,
            repo_key: repo_key.map(|k| k.to_string()),
        };
        record.installed_version = host
            .installed_version(&record.package_name)
            .unwrap_or(NOT_INSTALLED);
        Some(record)
    }

    fn pick_label(meta: &PackageMetadata) -> String {
        let candidates = [&meta.label, &meta.non_localized_label, &meta.loaded_label];
        for candidate in candidates.into_iter().flatten() {
            let trimmed = candidate.trim();
            if !trimmed.is_empty() && trimmed != meta.package_name {
                return trimmed.to_string();
            }
        }
        meta.package_name.clone()
    }

    fn extract_icon(
        package: &str,
        png: &[u8],
        artifact: &Path,
        fallback_dir: &Path,
    ) -> Option<String> {
        let name = format!("{}.png", package);
        let primary = artifact.parent().map(|d| d.join(&name));
        let target = match primary {
            Some(p) if std::fs::write(&p, png).is_ok() => p,
            _ => {
                let p = fallback_dir.join(&name);
                if std::fs::create_dir_all(fallback_dir).is_err()
                    || std::fs::write(&p, png).is_err()
                {
                    debug!("Could not cache icon for {}", package);
                    return None;
                }
                p
            }
        };
        Some(format!("{}{}", FILE_PREFIX, target.display()))
    }

    /// Full-field comparison, unlike equality which is by package name only
    pub fn same_fields(&self, other: &Self) -> bool {
        self.platform == other.platform
            && self.product_type == other.product_type
            && self.package_name == other.package_name
            && self.simple_name == other.simple_name
            && self.version == other.version
            && self.revision == other.revision
            && self.app_uri == other.app_uri
            && self.icon_uri == other.icon_uri
            && self.description == other.description
            && self.hash == other.hash
            && self.os_requirement == other.os_requirement
            && self.tak_requirement == other.tak_requirement
            && self.file_size == other.file_size
    }

    /// A record is valid when it carries the full descriptive field set and
    /// a verifiable signature, or when it is a minimal identity-only stub
    /// (sideloaded plugins have no descriptive metadata to offer).
    pub fn is_valid(&self, host: &dyn PackageHost) -> bool {
        let identity_ok = !self.package_name.is_empty()
            && !self.simple_name.is_empty()
            && self.revision >= 0
            && self.os_requirement >= 0;
        if !identity_ok {
            return false;
        }

        let fully_described = self.version.is_some()
            && self.app_uri.is_some()
            && self.icon_uri.is_some()
            && self.description.is_some()
            && self.hash.is_some()
            && self.tak_requirement.is_some();

        if fully_described {
            self.is_signature_valid(host)
        } else {
            // Minimal stub: identity fields only
            self.version.is_none()
                && self.icon_uri.is_none()
                && self.description.is_none()
                && self.hash.is_none()
        }
    }

    /// Signature is only checkable for installed plugins; everything else
    /// passes by default.
    pub fn is_signature_valid(&self, host: &dyn PackageHost) -> bool {
        if self.product_type.is_plugin() && host.is_installed(&self.package_name) {
            host.verify_signature(&self.package_name)
        } else {
            true
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed_version != NOT_INSTALLED
    }

    pub fn has_file_size(&self) -> bool {
        self.file_size != UNKNOWN_FILE_SIZE
    }

    pub fn set_installed_version(&mut self, version: Option<i32>) {
        self.installed_version = version.unwrap_or(NOT_INSTALLED);
    }

    pub fn is_os_compatible(&self, host: &dyn PackageHost) -> bool {
        host.os_api_level() >= self.os_requirement
    }

    /// Plugin-API compatibility. The host application is always compatible
    /// with itself; an empty requirement is permissive.
    pub fn is_tak_compatible(&self, host: &dyn PackageHost) -> bool {
        if self.package_name == host.host_package() {
            return true;
        }
        if !self.is_signature_valid(host) {
            return false;
        }
        match self.tak_requirement.as_deref() {
            None | Some("") => true,
            Some(req) => host.is_api_satisfied(&self.package_name, req),
        }
    }

    pub fn is_api_compatible(&self, host: &dyn PackageHost) -> bool {
        self.is_tak_compatible(host)
    }

    /// Overall gating. OS level is advisory only.
    pub fn is_compatible(&self, host: &dyn PackageHost) -> bool {
        self.is_tak_compatible(host)
    }

    pub fn os_incompatibility_reason(&self, host: &dyn PackageHost) -> String {
        if self.is_os_compatible(host) {
            String::new()
        } else {
            format!("suggested Android build: {}", self.os_requirement)
        }
    }

    pub fn tak_incompatibility_reason(&self, host: &dyn PackageHost) -> String {
        if self.package_name == host.host_package() {
            return String::new();
        }
        if !self.is_signature_valid(host) {
            return "The plugin is not signed correctly and will not be loaded.".to_string();
        }
        match self.tak_requirement.as_deref() {
            None | Some("") => String::new(),
            Some(req) if host.is_api_satisfied(&self.package_name, req) => String::new(),
            Some(req) => format!("requires TAK v{}", strip_api_version(req)),
        }
    }

    /// First applicable reason, plugin-API gating ahead of the advisory OS
    /// level. Empty when fully compatible.
    pub fn incompatibility_reason(&self, host: &dyn PackageHost) -> String {
        let tak = self.tak_incompatibility_reason(host);
        if !tak.is_empty() {
            return tak;
        }
        self.os_incompatibility_reason(host)
    }

    /// Case-insensitive match of `terms` against the searchable fields
    pub fn matches(&self, terms: &str) -> bool {
        let terms = terms.to_lowercase();
        let fields = [
            Some(self.package_name.as_str()),
            Some(self.simple_name.as_str()),
            self.version.as_deref(),
            self.app_uri.as_deref(),
            self.description.as_deref(),
        ];
        fields
            .into_iter()
            .flatten()
            .any(|f| f.to_lowercase().contains(&terms))
            || self.platform.to_string().to_lowercase().contains(&terms)
            || self.product_type.to_string().contains(&terms)
    }
}

/// Resolve a record URI against the index file it was read from. A
/// `file:` prefix marks an already absolute path; anything else without a
/// URL scheme is taken relative to the index directory.
pub fn resolve_uri(uri: &str, index_path: &Path) -> PathBuf {
    if let Some(absolute) = uri.strip_prefix(FILE_PREFIX) {
        return PathBuf::from(absolute);
    }

    let candidate = Path::new(uri);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }

    match index_path.parent() {
        Some(dir) => dir.join(candidate),
        None => candidate.to_path_buf(),
    }
}
