//! # Controller Capability Profiles
//!
//! A profile describes one controller family as data: which raw input code
//! feeds each canonical channel, each analog channel's calibration range, and
//! how the d-pad is reported. Profiles are TOML documents; two are built in
//! (DualShock4 and DualSense) and more can be dropped into a directory.
//!
//! ## Document format
//!
//! ```toml
//! profile_name = "DualShock4"
//!
//! [[devices]]
//! vendor_id = 0x054C
//! product_id = 0x09CC
//!
//! [sticks.left_x]
//! code = "ABS_X"
//! min = 0
//! max = 255
//!
//! [triggers.L2]
//! code = "ABS_Z"
//! min = 0
//! max = 255
//!
//! [buttons]
//! cross = "BTN_SOUTH"
//! touchpad = 547
//!
//! [dpad]
//! type = "hat"
//! hat_x = "ABS_HAT0X"
//! hat_y = "ABS_HAT0Y"
//! ```
//!
//! Channels a profile leaves out simply stay at their neutral value.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::channels::{Analog, AnalogFamily, Button};
use super::codes::{absolute_code, key_code, CodeKind, RawCode};
use crate::error::{BridgeError, Result};

/// Profiles compiled into the binary.
const BUILTIN_PROFILES: &[(&str, &str)] = &[
    ("dualshock4.toml", include_str!("../../profiles/dualshock4.toml")),
    ("dualsense.toml", include_str!("../../profiles/dualsense.toml")),
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileDocument {
    profile_name: String,
    devices: Vec<DeviceIdDocument>,
    #[serde(default)]
    sticks: BTreeMap<String, AxisDocument>,
    #[serde(default)]
    triggers: BTreeMap<String, AxisDocument>,
    #[serde(default)]
    buttons: BTreeMap<String, CodeDocument>,
    dpad: DpadDocument,
}

#[derive(Debug, Deserialize)]
struct DeviceIdDocument {
    vendor_id: u16,
    product_id: u16,
}

#[derive(Debug, Deserialize)]
struct AxisDocument {
    code: CodeDocument,
    min: i32,
    max: i32,
}

/// A code is either a symbolic name or the integer itself.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeDocument {
    Raw(u16),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct DpadDocument {
    #[serde(rename = "type")]
    kind: DpadKind,
    hat_x: Option<CodeDocument>,
    hat_y: Option<CodeDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DpadKind {
    Hat,
    Buttons,
}

/// Calibration of one analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisCalibration {
    pub channel: Analog,
    /// EV_ABS code
    pub code: u16,
    /// Raw value reported at one end of travel
    pub min: i32,
    /// Raw value reported at the other end of travel
    pub max: i32,
}

/// How the cross key is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpadMode {
    /// Two absolute axes carrying -1/0/+1.
    Hat { x: u16, y: u16 },
    /// Four ordinary buttons, listed among the profile's button codes.
    Buttons,
}

/// Resolved capability profile of one controller family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    name: String,
    device_ids: Vec<(u16, u16)>,
    axes: Vec<AxisCalibration>,
    buttons: Vec<(Button, u16)>,
    dpad: DpadMode,
}

impl DeviceProfile {
    /// Parses and resolves a profile document.
    ///
    /// # Errors
    ///
    /// `MalformedProfile` if the document does not parse, names an unknown
    /// channel, puts a channel in the wrong section, uses an unresolvable code
    /// name, maps two channels to the same code, or declares a hat d-pad
    /// without both axis codes.
    ///
    /// # Examples
    ///
    /// ```
    /// use dualshock_bridge::controller::channels::Analog;
    /// use dualshock_bridge::controller::profile::DeviceProfile;
    ///
    /// let profile = DeviceProfile::from_toml_str(r#"
    ///     profile_name = "Pad"
    ///     devices = [{ vendor_id = 1, product_id = 2 }]
    ///     sticks.left_x = { code = "ABS_X", min = -32768, max = 32767 }
    ///     dpad = { type = "buttons" }
    /// "#)?;
    /// assert_eq!(profile.axis(Analog::LeftX).map(|a| a.max), Some(32767));
    /// # Ok::<(), dualshock_bridge::error::BridgeError>(())
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let document: ProfileDocument = toml::from_str(contents)
            .map_err(|e| BridgeError::MalformedProfile(e.to_string()))?;
        Self::resolve(document)
    }

    fn resolve(document: ProfileDocument) -> Result<Self> {
        let name = document.profile_name;
        let malformed = |msg: String| BridgeError::MalformedProfile(format!("{}: {}", name, msg));

        if document.devices.is_empty() {
            return Err(malformed("no devices listed".to_string()));
        }
        let device_ids = document
            .devices
            .iter()
            .map(|d| (d.vendor_id, d.product_id))
            .collect();

        let mut seen: HashSet<RawCode> = HashSet::new();
        let mut claim = |code: RawCode, owner: &str| -> Result<()> {
            if seen.insert(code) {
                Ok(())
            } else {
                Err(malformed(format!("{} reuses code {}", owner, code.code)))
            }
        };

        let mut axes = Vec::new();
        for (section, family, entries) in [
            ("sticks", AnalogFamily::Stick, &document.sticks),
            ("triggers", AnalogFamily::Trigger, &document.triggers),
        ] {
            for (channel_name, axis) in entries {
                let channel = Analog::from_name(channel_name)
                    .ok_or_else(|| malformed(format!("unknown analog channel '{}'", channel_name)))?;
                if channel.family() != family {
                    return Err(malformed(format!(
                        "'{}' does not belong in [{}]",
                        channel_name, section
                    )));
                }
                let code = resolve_code(&axis.code, CodeKind::Absolute)
                    .map_err(|e| malformed(format!("{}: {}", channel_name, e)))?;
                claim(RawCode::absolute(code), channel_name)?;
                axes.push(AxisCalibration {
                    channel,
                    code,
                    min: axis.min,
                    max: axis.max,
                });
            }
        }

        let mut buttons = Vec::new();
        for (channel_name, code) in &document.buttons {
            let button = Button::from_name(channel_name)
                .ok_or_else(|| malformed(format!("unknown button channel '{}'", channel_name)))?;
            let code = resolve_code(code, CodeKind::Key)
                .map_err(|e| malformed(format!("{}: {}", channel_name, e)))?;
            claim(RawCode::key(code), channel_name)?;
            buttons.push((button, code));
        }

        let dpad = match document.dpad.kind {
            DpadKind::Hat => {
                let (Some(hat_x), Some(hat_y)) = (&document.dpad.hat_x, &document.dpad.hat_y) else {
                    return Err(malformed("hat d-pad needs both hat_x and hat_y".to_string()));
                };
                let x = resolve_code(hat_x, CodeKind::Absolute)
                    .map_err(|e| malformed(format!("hat_x: {}", e)))?;
                let y = resolve_code(hat_y, CodeKind::Absolute)
                    .map_err(|e| malformed(format!("hat_y: {}", e)))?;
                claim(RawCode::absolute(x), "hat_x")?;
                claim(RawCode::absolute(y), "hat_y")?;
                DpadMode::Hat { x, y }
            }
            DpadKind::Buttons => DpadMode::Buttons,
        };

        axes.sort_by_key(|a| a.channel);
        buttons.sort_by_key(|&(b, _)| b);

        Ok(Self {
            name,
            device_ids,
            axes,
            buttons,
            dpad,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// (vendor id, product id) pairs this profile applies to.
    #[must_use]
    pub fn device_ids(&self) -> &[(u16, u16)] {
        &self.device_ids
    }

    /// Calibrated analog channels, in canonical order.
    #[must_use]
    pub fn axes(&self) -> &[AxisCalibration] {
        &self.axes
    }

    #[must_use]
    pub fn axis(&self, channel: Analog) -> Option<&AxisCalibration> {
        self.axes.iter().find(|a| a.channel == channel)
    }

    /// Button channels with their EV_KEY codes, in canonical order.
    #[must_use]
    pub fn buttons(&self) -> &[(Button, u16)] {
        &self.buttons
    }

    #[must_use]
    pub fn dpad(&self) -> DpadMode {
        self.dpad
    }
}

fn resolve_code(code: &CodeDocument, kind: CodeKind) -> std::result::Result<u16, String> {
    match code {
        CodeDocument::Raw(value) => Ok(*value),
        CodeDocument::Name(name) => {
            let resolved = match kind {
                CodeKind::Absolute => absolute_code(name),
                CodeKind::Key => key_code(name),
            };
            resolved.ok_or_else(|| format!("unknown input code '{}'", name))
        }
    }
}

/// Every loaded profile, indexed by name and by (vendor, product).
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, DeviceProfile>,
    devices: HashMap<(u16, u16), String>,
}

impl ProfileRegistry {
    /// Registry with no profiles.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the profiles compiled into the binary.
    ///
    /// # Errors
    ///
    /// `MalformedProfile` if a built-in document is broken.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::empty();
        for (file, contents) in BUILTIN_PROFILES {
            debug!("Loading built-in profile {}", file);
            registry.insert(DeviceProfile::from_toml_str(contents)?);
        }
        Ok(registry)
    }

    /// Loads every `*.toml` in `dir` (sorted by file name) into the registry.
    ///
    /// A profile with the same name as an already loaded one replaces it.
    ///
    /// # Returns
    ///
    /// Number of profiles loaded.
    ///
    /// # Errors
    ///
    /// `Io` if the directory or a file cannot be read, `MalformedProfile` if a
    /// document is invalid. Nothing is inserted when any file fails.
    pub fn extend_from_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir.as_ref())?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut loaded = Vec::with_capacity(paths.len());
        for path in &paths {
            let contents = fs::read_to_string(path)?;
            let profile = DeviceProfile::from_toml_str(&contents).map_err(|e| match e {
                BridgeError::MalformedProfile(msg) => {
                    BridgeError::MalformedProfile(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?;
            loaded.push(profile);
        }

        let count = loaded.len();
        for profile in loaded {
            info!("Loaded controller profile '{}'", profile.name());
            self.insert(profile);
        }
        Ok(count)
    }

    /// Adds (or replaces) a profile.
    pub fn insert(&mut self, profile: DeviceProfile) {
        self.devices.retain(|_, name| name != profile.name());
        for &id in profile.device_ids() {
            self.devices.insert(id, profile.name().to_string());
        }
        self.profiles.insert(profile.name().to_string(), profile);
    }

    /// Looks up a profile by name.
    ///
    /// # Errors
    ///
    /// `UnknownProfile` if no profile has that name.
    pub fn get(&self, name: &str) -> Result<&DeviceProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| BridgeError::UnknownProfile(name.to_string()))
    }

    /// Name of the profile registered for a (vendor, product) pair.
    #[must_use]
    pub fn profile_for_device(&self, vendor: u16, product: u16) -> Option<&str> {
        self.devices.get(&(vendor, product)).map(String::as_str)
    }

    /// Profile names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
