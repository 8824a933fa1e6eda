//! Stages a Pdfium shared library for the current target and exposes its
//! location to the crate as `PDFVIEW_PDFIUM_LIBRARY_PATH`.

use std::env;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use walkdir::WalkDir;
use zip::read::ZipArchive;

const DEFAULT_PDFIUM_VERSION: &str = "7350";
const DEFAULT_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

const WATCHED_ENV: &[&str] = &[
    "PDFVIEW_PDFIUM_SKIP_DOWNLOAD",
    "PDFVIEW_PDFIUM_ARCHIVE_PATH",
    "PDFVIEW_PDFIUM_VERSION",
    "PDFVIEW_PDFIUM_PLATFORM",
    "PDFVIEW_PDFIUM_BASE_URL",
    "PDFIUM_DYNAMIC_LIB_PATH",
    "PDFIUM_STATIC_LIB_PATH",
];

struct Staging {
    dir: PathBuf,
    target_os: String,
    platform: String,
    version: String,
    base_url: String,
}

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    for name in WATCHED_ENV {
        println!("cargo:rerun-if-env-changed={name}");
    }

    let skip = env::var_os("PDFVIEW_PDFIUM_SKIP_DOWNLOAD").is_some()
        || env::var_os("PDFIUM_DYNAMIC_LIB_PATH").is_some()
        || env::var_os("PDFIUM_STATIC_LIB_PATH").is_some();
    if skip {
        return Ok(());
    }

    let staging = Staging::from_env()?;
    match staging.stage() {
        Ok(library) => {
            let library = library
                .to_str()
                .ok_or_else(|| anyhow!("library path {:?} is not UTF-8", library))?;
            println!("cargo:rustc-env=PDFVIEW_PDFIUM_LIBRARY_PATH={library}");
        }
        // The runtime falls back to the working directory and system paths.
        Err(err) => println!("cargo:warning=pdfium was not staged: {err:#}"),
    }
    Ok(())
}

impl Staging {
    fn from_env() -> Result<Self> {
        let out_dir = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR env var not set")?);
        let target_os =
            env::var("CARGO_CFG_TARGET_OS").context("CARGO_CFG_TARGET_OS env var missing")?;
        let target_arch =
            env::var("CARGO_CFG_TARGET_ARCH").context("CARGO_CFG_TARGET_ARCH env var missing")?;
        Ok(Self {
            dir: out_dir.join("pdfium"),
            platform: env::var("PDFVIEW_PDFIUM_PLATFORM")
                .unwrap_or_else(|_| platform_name(&target_os, &target_arch)),
            target_os,
            version: env::var("PDFVIEW_PDFIUM_VERSION")
                .unwrap_or_else(|_| DEFAULT_PDFIUM_VERSION.to_string()),
            base_url: env::var("PDFVIEW_PDFIUM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn stage(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {:?}", self.dir))?;
        if let Some(library) = self.find_library() {
            return Ok(library);
        }

        let archive = match env::var_os("PDFVIEW_PDFIUM_ARCHIVE_PATH") {
            Some(path) => PathBuf::from(path),
            None => self.download()?,
        };
        unpack(&archive, &self.dir)?;
        self.find_library()
            .ok_or_else(|| anyhow!("no pdfium library inside {:?}", archive))
    }

    fn find_library(&self) -> Option<PathBuf> {
        let wanted = match self.target_os.as_str() {
            "windows" => "pdfium.dll",
            "macos" => "libpdfium.dylib",
            _ => "libpdfium.so",
        };
        WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.file_type().is_file() && entry.file_name() == OsStr::new(wanted))
            .map(|entry| entry.into_path())
    }

    fn download(&self) -> Result<PathBuf> {
        let downloads = self.dir.join("downloads");
        fs::create_dir_all(&downloads)
            .with_context(|| format!("failed to create {:?}", downloads))?;

        let agent = ureq::AgentBuilder::new()
            .timeout_read(Duration::from_secs(120))
            .build();
        let mut failures = Vec::new();
        for file_name in [
            format!("pdfium-{}.tgz", self.platform),
            format!("pdfium-{}.zip", self.platform),
        ] {
            let destination = downloads.join(&file_name);
            if destination.exists() {
                return Ok(destination);
            }
            let url = format!(
                "{}/chromium/{}/{}",
                self.base_url.trim_end_matches('/'),
                self.version,
                file_name
            );
            match fetch(&agent, &url, &destination) {
                Ok(()) => return Ok(destination),
                Err(err) => failures.push(format!("{url}: {err}")),
            }
        }
        Err(anyhow!("download failed ({})", failures.join("; ")))
    }
}

fn platform_name(target_os: &str, target_arch: &str) -> String {
    let os = match target_os {
        "macos" => "mac",
        other => other,
    };
    let arch = match target_arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        other => other,
    };
    format!("{os}-{arch}")
}

fn fetch(agent: &ureq::Agent, url: &str, destination: &Path) -> Result<()> {
    let response = agent.get(url).call().map_err(|err| anyhow!("{err}"))?;
    let partial = destination.with_extension("part");
    let mut file =
        File::create(&partial).with_context(|| format!("failed to create {:?}", partial))?;
    io::copy(&mut response.into_reader(), &mut file)
        .with_context(|| format!("failed to write {:?}", partial))?;
    fs::rename(&partial, destination)?;
    Ok(())
}

fn unpack(archive: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive).with_context(|| format!("failed to open {:?}", archive))?;
    let is_zip = archive
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(destination))
            .with_context(|| format!("failed to extract {:?}", archive))
    } else {
        Archive::new(GzDecoder::new(file))
            .unpack(destination)
            .with_context(|| format!("failed to unpack {:?}", archive))
    }
}
