//! Build environment, resolved once per `build` run.

use log::debug;
use std::path::{Path, PathBuf};

use super::BuildError;
use crate::runtime::Runtime;

const GRADLE_SCRIPT: &str = "watchface/build.gradle.kts";
const TOOLS_DIR: &str = "wff-build-tools";

#[derive(Debug, Clone, PartialEq)]
pub struct BuildEnv {
    pub project_dir: PathBuf,
    pub java_home: PathBuf,
    pub android_home: PathBuf,
    pub watchface_id: String,
    /// `<project_dir>/../wff-build-tools`
    pub tools_dir: PathBuf,
}

impl BuildEnv {
    /// `WATCHFACE_ID` wins over the `applicationId` in the gradle script.
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime>(runtime: &R, project_dir: &Path) -> Result<Self, BuildError> {
        let watchface_id = match runtime.env_var("WATCHFACE_ID") {
            Ok(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => read_application_id(runtime, project_dir)?,
        };
        debug!("Watch face id: {}", watchface_id);

        let java_home = required_env(runtime, "JAVA_HOME")?;
        let android_home = required_env(runtime, "ANDROID_HOME")?;

        let tools_dir = project_dir
            .parent()
            .unwrap_or(project_dir)
            .join(TOOLS_DIR);

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            java_home,
            android_home,
            watchface_id,
            tools_dir,
        })
    }

    pub fn java(&self) -> PathBuf {
        self.java_home.join("bin").join(exe("java"))
    }

    pub fn adb(&self) -> PathBuf {
        self.android_home.join("platform-tools").join(exe("adb"))
    }

    pub fn gradlew(&self) -> PathBuf {
        if cfg!(windows) {
            self.project_dir.join("gradlew.bat")
        } else {
            self.project_dir.join("gradlew")
        }
    }

    /// A path inside the project.
    pub fn project_path(&self, relative: &str) -> PathBuf {
        self.project_dir.join(relative)
    }
}

fn exe(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

fn required_env<R: Runtime>(runtime: &R, key: &'static str) -> Result<PathBuf, BuildError> {
    match runtime.env_var(key) {
        Ok(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(BuildError::MissingEnv(key)),
    }
}

fn read_application_id<R: Runtime>(runtime: &R, project_dir: &Path) -> Result<String, BuildError> {
    let script = project_dir.join(GRADLE_SCRIPT);
    if !runtime.exists(&script) {
        return Err(BuildError::GradleScriptMissing(script));
    }
    let content = runtime
        .read_to_string(&script)
        .map_err(|_| BuildError::WatchFaceId(script.clone()))?;
    parse_application_id(&content).ok_or(BuildError::WatchFaceId(script))
}

/// Extracts the value of the first `applicationId = "..."` assignment.
pub fn parse_application_id(content: &str) -> Option<String> {
    let mut rest = content;
    while let Some(pos) = rest.find("applicationId") {
        rest = &rest[pos + "applicationId".len()..];
        let Some(value) = rest.trim_start().strip_prefix('=') else {
            continue;
        };
        let Some(quoted) = value.trim_start().strip_prefix('"') else {
            continue;
        };
        if let Some(end) = quoted.find('"') {
            return Some(quoted[..end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::env::VarError;

    const GRADLE: &str = r#"
plugins {
    id("com.android.application")
}

android {
    namespace = "com.example.watchface"
    defaultConfig {
        applicationId = "com.example.analog"
        minSdk = 33
    }
}
"#;

    fn expect_env(runtime: &mut MockRuntime, key: &'static str, value: Option<&'static str>) {
        runtime
            .expect_env_var()
            .with(eq(key))
            .returning(move |_| value.map(String::from).ok_or(VarError::NotPresent));
    }

    #[test]
    fn test_parse_application_id() {
        assert_eq!(
            parse_application_id(GRADLE),
            Some("com.example.analog".to_string())
        );
        assert_eq!(
            parse_application_id("applicationId=\"a.b\""),
            Some("a.b".to_string())
        );
        assert_eq!(parse_application_id("// applicationId is set below"), None);
        assert_eq!(
            parse_application_id("applicationIdSuffix\napplicationId = \"x.y\""),
            Some("x.y".to_string())
        );
        assert_eq!(parse_application_id("namespace = \"a\""), None);
    }

    #[test]
    fn test_resolve_reads_gradle_script() {
        let project = PathBuf::from("/work/analog");
        let mut runtime = MockRuntime::new();
        expect_env(&mut runtime, "WATCHFACE_ID", None);
        expect_env(&mut runtime, "JAVA_HOME", Some("/opt/jdk"));
        expect_env(&mut runtime, "ANDROID_HOME", Some("/opt/android"));
        runtime
            .expect_exists()
            .with(eq(project.join(GRADLE_SCRIPT)))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(GRADLE.to_string()));

        let env = BuildEnv::resolve(&runtime, &project).unwrap();

        assert_eq!(env.watchface_id, "com.example.analog");
        assert_eq!(env.tools_dir, PathBuf::from("/work/wff-build-tools"));
        assert_eq!(env.java_home, PathBuf::from("/opt/jdk"));
        assert!(env.adb().starts_with("/opt/android/platform-tools"));
        assert!(env.java().starts_with("/opt/jdk/bin"));
    }

    #[test]
    fn test_resolve_prefers_watchface_id_env() {
        let project = PathBuf::from("/work/analog");
        let mut runtime = MockRuntime::new();
        expect_env(&mut runtime, "WATCHFACE_ID", Some("com.example.override"));
        expect_env(&mut runtime, "JAVA_HOME", Some("/opt/jdk"));
        expect_env(&mut runtime, "ANDROID_HOME", Some("/opt/android"));
        runtime.expect_read_to_string().never();

        let env = BuildEnv::resolve(&runtime, &project).unwrap();

        assert_eq!(env.watchface_id, "com.example.override");
    }

    #[test]
    fn test_resolve_missing_gradle_script() {
        let project = PathBuf::from("/work/analog");
        let mut runtime = MockRuntime::new();
        expect_env(&mut runtime, "WATCHFACE_ID", None);
        runtime.expect_exists().returning(|_| false);

        let err = BuildEnv::resolve(&runtime, &project).unwrap_err();

        assert!(matches!(err, BuildError::GradleScriptMissing(_)));
        assert_eq!(err.exit_code(), 9);
    }

    #[test]
    fn test_resolve_gradle_script_without_id() {
        let project = PathBuf::from("/work/analog");
        let mut runtime = MockRuntime::new();
        expect_env(&mut runtime, "WATCHFACE_ID", None);
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("android {}".to_string()));

        let err = BuildEnv::resolve(&runtime, &project).unwrap_err();

        assert!(matches!(err, BuildError::WatchFaceId(_)));
    }

    #[test]
    fn test_resolve_missing_android_home() {
        let project = PathBuf::from("/work/analog");
        let mut runtime = MockRuntime::new();
        expect_env(&mut runtime, "WATCHFACE_ID", Some("com.example.analog"));
        expect_env(&mut runtime, "JAVA_HOME", Some("/opt/jdk"));
        expect_env(&mut runtime, "ANDROID_HOME", None);

        let err = BuildEnv::resolve(&runtime, &project).unwrap_err();

        assert!(matches!(err, BuildError::MissingEnv("ANDROID_HOME")));
        assert_eq!(err.exit_code(), 7);
    }
}
