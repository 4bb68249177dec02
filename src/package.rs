//! Packaging parameters and the `RunUAT BuildCookRun` command builder.
//!
//! `PackagingParameters` is the fixed set of 17 values the packaging form edits.
//! `build_package_command` turns them (plus the working directory) into a
//! command line, or into a placeholder explaining what is still missing.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

const RUN_UAT: &str = "Engine/Build/BatchFiles/RunUAT.bat BuildCookRun";

/// A persisted packaging value: either a flag or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Flag(bool),
    Text(String),
}

/// Persisted form of `PackagingParameters`, keyed by parameter name.
pub type PackageSettings = BTreeMap<String, SettingValue>;

/// How a parameter is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Flag,
    Text,
    /// Free text with a list of suggested values.
    Choice(&'static [&'static str]),
}

pub const PLATFORMS: &[&str] = &["Win64", "PS5", "XSX", "Linux", "Mac"];
pub const CONFIGURATIONS: &[&str] = &["Development", "Shipping", "DebugGame"];
pub const COOK_MODES: &[&str] = &["cook", "skipcook"];

/// Names of the packaging parameters, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Project,
    Platform,
    Configuration,
    Cook,
    NoXge,
    NoCompileEditor,
    SkipBuildEditor,
    Prereqs,
    Build,
    Stage,
    Package,
    Archive,
    NoSndbsShaderCompile,
    NoRemoteShaderCompile,
    ArchiveDirectory,
    CookerOptions,
    Compressed,
}

impl Param {
    pub const ALL: [Param; 17] = [
        Param::Project,
        Param::Platform,
        Param::Configuration,
        Param::Cook,
        Param::NoXge,
        Param::NoCompileEditor,
        Param::SkipBuildEditor,
        Param::Prereqs,
        Param::Build,
        Param::Stage,
        Param::Package,
        Param::Archive,
        Param::NoSndbsShaderCompile,
        Param::NoRemoteShaderCompile,
        Param::ArchiveDirectory,
        Param::CookerOptions,
        Param::Compressed,
    ];

    /// Key used in the profile file. Case-sensitive.
    pub fn name(self) -> &'static str {
        match self {
            Param::Project => "Project",
            Param::Platform => "Platform",
            Param::Configuration => "Configuration",
            Param::Cook => "Cook",
            Param::NoXge => "NoXGE",
            Param::NoCompileEditor => "NoCompileEditor",
            Param::SkipBuildEditor => "SkipBuildEditor",
            Param::Prereqs => "Prereqs",
            Param::Build => "Build",
            Param::Stage => "Stage",
            Param::Package => "Package",
            Param::Archive => "Archive",
            Param::NoSndbsShaderCompile => "NoSndbsShaderCompile",
            Param::NoRemoteShaderCompile => "NoRemoteShaderCompile",
            Param::ArchiveDirectory => "ArchiveDirectory",
            Param::CookerOptions => "CookerOptions",
            Param::Compressed => "Compressed",
        }
    }

    pub fn from_name(name: &str) -> Option<Param> {
        Param::ALL.into_iter().find(|param| param.name() == name)
    }

    pub fn kind(self) -> ParamKind {
        match self {
            Param::Project | Param::ArchiveDirectory | Param::CookerOptions => ParamKind::Text,
            Param::Platform => ParamKind::Choice(PLATFORMS),
            Param::Configuration => ParamKind::Choice(CONFIGURATIONS),
            Param::Cook => ParamKind::Choice(COOK_MODES),
            _ => ParamKind::Flag,
        }
    }

    /// Label shown next to the value in the form.
    pub fn label(self) -> &'static str {
        match self {
            Param::Project => "Project",
            Param::Platform => "Platform",
            Param::Configuration => "Configuration",
            Param::Cook => "Cook",
            Param::NoXge => "No XGE",
            Param::NoCompileEditor => "No Compile Editor",
            Param::SkipBuildEditor => "Skip Build Editor",
            Param::Prereqs => "Prereqs",
            Param::Build => "Build",
            Param::Stage => "Stage",
            Param::Package => "Package",
            Param::Archive => "Archive",
            Param::NoSndbsShaderCompile => "No SN-DBS Shader Compile",
            Param::NoRemoteShaderCompile => "No Remote Shader Compile",
            Param::ArchiveDirectory => "Archive Directory",
            Param::CookerOptions => "Cooker Options",
            Param::Compressed => "Compressed",
        }
    }
}

/// Current values of the packaging form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagingParameters {
    pub project: String,
    pub platform: String,
    pub configuration: String,
    pub cook: String,
    pub no_xge: bool,
    pub no_compile_editor: bool,
    pub skip_build_editor: bool,
    pub prereqs: bool,
    pub build: bool,
    pub stage: bool,
    pub package: bool,
    pub archive: bool,
    pub no_sndbs_shader_compile: bool,
    pub no_remote_shader_compile: bool,
    pub archive_directory: String,
    pub cooker_options: String,
    pub compressed: bool,
}

impl Default for PackagingParameters {
    fn default() -> Self {
        Self {
            project: String::new(),
            platform: "Win64".to_string(),
            configuration: "Development".to_string(),
            cook: "cook".to_string(),
            no_xge: true,
            no_compile_editor: true,
            skip_build_editor: true,
            prereqs: true,
            build: true,
            stage: true,
            package: true,
            archive: true,
            no_sndbs_shader_compile: true,
            no_remote_shader_compile: true,
            archive_directory: String::new(),
            cooker_options: "-cookprocesscount=4".to_string(),
            compressed: true,
        }
    }
}

impl PackagingParameters {
    fn flag_mut(&mut self, param: Param) -> Option<&mut bool> {
        let flag = match param {
            Param::NoXge => &mut self.no_xge,
            Param::NoCompileEditor => &mut self.no_compile_editor,
            Param::SkipBuildEditor => &mut self.skip_build_editor,
            Param::Prereqs => &mut self.prereqs,
            Param::Build => &mut self.build,
            Param::Stage => &mut self.stage,
            Param::Package => &mut self.package,
            Param::Archive => &mut self.archive,
            Param::NoSndbsShaderCompile => &mut self.no_sndbs_shader_compile,
            Param::NoRemoteShaderCompile => &mut self.no_remote_shader_compile,
            Param::Compressed => &mut self.compressed,
            _ => return None,
        };
        Some(flag)
    }

    fn text_mut(&mut self, param: Param) -> Option<&mut String> {
        let text = match param {
            Param::Project => &mut self.project,
            Param::Platform => &mut self.platform,
            Param::Configuration => &mut self.configuration,
            Param::Cook => &mut self.cook,
            Param::ArchiveDirectory => &mut self.archive_directory,
            Param::CookerOptions => &mut self.cooker_options,
            _ => return None,
        };
        Some(text)
    }

    pub fn get(&self, param: Param) -> SettingValue {
        match param {
            Param::Project => SettingValue::Text(self.project.clone()),
            Param::Platform => SettingValue::Text(self.platform.clone()),
            Param::Configuration => SettingValue::Text(self.configuration.clone()),
            Param::Cook => SettingValue::Text(self.cook.clone()),
            Param::NoXge => SettingValue::Flag(self.no_xge),
            Param::NoCompileEditor => SettingValue::Flag(self.no_compile_editor),
            Param::SkipBuildEditor => SettingValue::Flag(self.skip_build_editor),
            Param::Prereqs => SettingValue::Flag(self.prereqs),
            Param::Build => SettingValue::Flag(self.build),
            Param::Stage => SettingValue::Flag(self.stage),
            Param::Package => SettingValue::Flag(self.package),
            Param::Archive => SettingValue::Flag(self.archive),
            Param::NoSndbsShaderCompile => SettingValue::Flag(self.no_sndbs_shader_compile),
            Param::NoRemoteShaderCompile => SettingValue::Flag(self.no_remote_shader_compile),
            Param::ArchiveDirectory => SettingValue::Text(self.archive_directory.clone()),
            Param::CookerOptions => SettingValue::Text(self.cooker_options.clone()),
            Param::Compressed => SettingValue::Flag(self.compressed),
        }
    }

    /// Sets `param` when `value` has the matching type. Returns whether the value changed.
    pub fn set(&mut self, param: Param, value: SettingValue) -> bool {
        match value {
            SettingValue::Flag(value) => match self.flag_mut(param) {
                Some(flag) if *flag != value => {
                    *flag = value;
                    true
                }
                _ => false,
            },
            SettingValue::Text(value) => match self.text_mut(param) {
                Some(text) if *text != value => {
                    *text = value;
                    true
                }
                _ => false,
            },
        }
    }

    /// Flips a flag parameter. Returns the new value, or `None` for text parameters.
    pub fn toggle(&mut self, param: Param) -> Option<bool> {
        let flag = self.flag_mut(param)?;
        *flag = !*flag;
        Some(*flag)
    }

    /// Moves a choice parameter to the next (or previous) suggested value.
    ///
    /// A value outside the suggestion list jumps to the first suggestion.
    pub fn cycle(&mut self, param: Param, forward: bool) -> bool {
        let ParamKind::Choice(choices) = param.kind() else {
            return false;
        };
        let Some(text) = self.text_mut(param) else {
            return false;
        };
        let next = match choices.iter().position(|choice| *choice == text.as_str()) {
            Some(idx) if forward => (idx + 1) % choices.len(),
            Some(idx) => (idx + choices.len() - 1) % choices.len(),
            None => 0,
        };
        *text = choices[next].to_string();
        true
    }

    /// Parses a `--set` style string into the parameter's type and applies it.
    pub fn set_from_str(&mut self, name: &str, raw: &str) -> Result<()> {
        let param = Param::from_name(name)
            .ok_or_else(|| anyhow!("unknown packaging parameter {}", name))?;
        let value = match param.kind() {
            ParamKind::Flag => SettingValue::Flag(parse_flag(raw)?),
            ParamKind::Text | ParamKind::Choice(_) => SettingValue::Text(raw.to_string()),
        };
        self.set(param, value);
        Ok(())
    }

    /// Snapshot of every parameter, as stored in a directory profile.
    pub fn to_settings(&self) -> PackageSettings {
        Param::ALL
            .into_iter()
            .map(|param| (param.name().to_string(), self.get(param)))
            .collect()
    }

    /// Applies stored settings. Unknown names and mistyped values are ignored.
    pub fn apply_settings(&mut self, settings: &PackageSettings) {
        for (name, value) in settings {
            if let Some(param) = Param::from_name(name) {
                self.set(param, value.clone());
            }
        }
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("expected true or false, got {}", other),
    }
}

/// Result of building the packaging command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPreview {
    /// A runnable command line.
    Ready(String),
    NeedsDirectory,
    NeedsProject,
}

impl CommandPreview {
    pub fn command(&self) -> Option<&str> {
        match self {
            CommandPreview::Ready(line) => Some(line),
            _ => None,
        }
    }
}

impl fmt::Display for CommandPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandPreview::Ready(line) => f.write_str(line),
            CommandPreview::NeedsDirectory => f.write_str("Please select a working directory first"),
            CommandPreview::NeedsProject => f.write_str("Please select a project file"),
        }
    }
}

/// Builds the `RunUAT.bat BuildCookRun` command for `working_dir`.
///
/// Pure: called again after every parameter or directory change.
pub fn build_package_command(working_dir: &str, params: &PackagingParameters) -> CommandPreview {
    if working_dir.is_empty() {
        return CommandPreview::NeedsDirectory;
    }
    if params.project.is_empty() {
        return CommandPreview::NeedsProject;
    }

    let mut parts = vec![
        base_command(working_dir),
        format!("-project=\"{}\"", params.project),
        format!("-platform={}", params.platform),
        format!("-configuration={}", params.configuration),
    ];

    if params.build {
        parts.push("-build".to_string());
    }
    match params.cook.as_str() {
        "cook" => parts.push("-cook".to_string()),
        "skipcook" => parts.push("-skipcook".to_string()),
        _ => {}
    }

    let flags = [
        (params.stage, "-stage"),
        (params.package, "-package"),
        (params.archive, "-archive"),
        (params.prereqs, "-prereqs"),
        (params.no_xge, "-NoXGE"),
        (params.no_compile_editor, "-nocompileeditor"),
        (params.skip_build_editor, "-skipbuildeditor"),
        (params.no_sndbs_shader_compile, "-NoSndbsShaderCompile"),
        (params.no_remote_shader_compile, "-NoRemoteShaderCompile"),
        (params.compressed, "-compressed"),
    ];
    parts.extend(
        flags
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, flag)| flag.to_string()),
    );

    let archive_dir = params.archive_directory.trim();
    if !archive_dir.is_empty() {
        parts.push(format!("-archivedirectory=\"{}\"", archive_dir));
    }
    // Cooker options go through unquoted.
    let cooker_options = params.cooker_options.trim();
    if !cooker_options.is_empty() {
        parts.push(format!("-AdditionalCookerOptions={}", cooker_options));
    }

    CommandPreview::Ready(parts.join(" "))
}

fn base_command(working_dir: &str) -> String {
    if working_dir.ends_with('/') || working_dir.ends_with('\\') {
        format!("{}{}", working_dir, RUN_UAT)
    } else {
        format!("{}/{}", working_dir, RUN_UAT)
    }
}
