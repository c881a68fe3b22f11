use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use distro_install::config::{load_config, InstallConfig};
use distro_install::devicetree::LsblkDeviceTree;
use distro_install::logging::setup_logging;
use distro_install::media::lock::{ScanLock, DEFAULT_SCAN_LOCK};
use distro_install::media::{
    find_optical_media, mount_image, potential_hdiso_sources, verify_media, IsoScanner,
};
use distro_install::preflight::{check_media_tools, check_required_tools, SYSTEMD_TOOLS};
use distro_install::service::InitSystem;
use distro_install::task::{run_tasks, ConfigurationTask};
use distro_install::{ConfigureNtpTask, ConfigureTimezoneTask, RetryPolicy, SystemMounter};

fn usage() -> &'static str {
    "Usage:\n  distro-install [--debug] [--config <file>] media find-image <path>\n  distro-install [--debug] [--config <file>] media mount-image <source> <target>\n  distro-install [--debug] [--config <file>] media find-optical\n  distro-install [--debug] [--config <file>] media hdiso-sources\n  distro-install [--debug] [--config <file>] media verify <tree> [timestamp]\n  distro-install [--debug] [--config <file>] configure <sysroot> [config.toml]"
}

struct GlobalFlags {
    debug: bool,
    config: Option<PathBuf>,
}

/// Strip global flags, returning them with the remaining arguments.
fn split_flags(args: Vec<String>) -> Result<(GlobalFlags, Vec<String>)> {
    let mut flags = GlobalFlags {
        debug: false,
        config: None,
    };
    let mut rest = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--debug" => flags.debug = true,
            "--config" => {
                let Some(path) = iter.next() else {
                    bail!("--config requires a file argument\n{}", usage());
                };
                flags.config = Some(PathBuf::from(path));
            }
            _ => rest.push(arg),
        }
    }
    Ok((flags, rest))
}

fn main() -> Result<()> {
    let (flags, args) = split_flags(std::env::args().skip(1).collect())?;
    setup_logging(flags.debug)?;
    let config = load_config(flags.config.as_deref())?;

    match args.as_slice() {
        [media, find, path] if media == "media" && find == "find-image" => {
            find_image(&config, Path::new(path))
        }
        [media, mount, source, target] if media == "media" && mount == "mount-image" => {
            mount_image_cmd(&config, Path::new(source), Path::new(target))
        }
        [media, find] if media == "media" && find == "find-optical" => find_optical(&config),
        [media, list] if media == "media" && list == "hdiso-sources" => list_hdiso_sources(),
        [media, verify, tree] if media == "media" && verify == "verify" => {
            verify_tree(&config, Path::new(tree), None)
        }
        [media, verify, tree, timestamp] if media == "media" && verify == "verify" => {
            verify_tree(&config, Path::new(tree), Some(timestamp.as_str()))
        }
        [configure, sysroot] if configure == "configure" => {
            configure_sysroot(&config, Path::new(sysroot))
        }
        [configure, sysroot, file] if configure == "configure" => {
            let config = load_config(Some(Path::new(file)))?;
            configure_sysroot(&config, Path::new(sysroot))
        }
        _ => bail!(usage()),
    }
}

fn scanner<'a>(config: &InstallConfig, mounter: &'a SystemMounter) -> IsoScanner<'a> {
    IsoScanner::new(mounter, config.arch.clone())
        .with_mount_point(&config.media.scan_mount_point)
        .with_base_repos(config.media.base_repos.clone())
}

fn scan_lock() -> Result<ScanLock> {
    let path = Path::new(DEFAULT_SCAN_LOCK);
    ScanLock::try_acquire(path)
        .with_context(|| format!("opening scan lock '{}'", path.display()))?
        .with_context(|| format!("another media scan holds '{}'", path.display()))
}

fn find_image(config: &InstallConfig, path: &Path) -> Result<()> {
    check_media_tools()?;
    let _lock = scan_lock()?;
    let mounter = SystemMounter;
    let mut policy = RetryPolicy::new(config.media.retries);

    let found = scanner(config, &mounter)
        .find_first_image(path, &mut policy)
        .with_context(|| format!("scanning '{}' for images", path.display()))?;
    match found {
        Some(name) => {
            println!("{name}");
            Ok(())
        }
        None => bail!("no usable {} image under '{}'", config.arch, path.display()),
    }
}

fn mount_image_cmd(config: &InstallConfig, source: &Path, target: &Path) -> Result<()> {
    check_media_tools()?;
    let _lock = scan_lock()?;
    let mounter = SystemMounter;
    let mut policy = RetryPolicy::new(config.media.retries);

    let image = mount_image(source, target, &scanner(config, &mounter), &mounter, &mut policy)
        .with_context(|| {
            format!(
                "mounting image from '{}' on '{}'",
                source.display(),
                target.display()
            )
        })?;
    println!("{}", image.display());
    Ok(())
}

fn find_optical(config: &InstallConfig) -> Result<()> {
    check_media_tools()?;
    let mut tree = LsblkDeviceTree::probe(SystemMounter).context("probing block devices")?;

    match find_optical_media(&mut tree, &config.arch, config.media.scratch_dir.as_deref()) {
        Some(device) => {
            println!("{}", device.path.display());
            Ok(())
        }
        None => bail!("no optical media for {}", config.arch),
    }
}

fn list_hdiso_sources() -> Result<()> {
    check_media_tools()?;
    let tree = LsblkDeviceTree::probe(SystemMounter).context("probing block devices")?;
    for device in potential_hdiso_sources(&tree) {
        let fstype = device.format.kind.fstype().unwrap_or("unknown");
        println!("{}\t{}", device.path.display(), fstype);
    }
    Ok(())
}

fn verify_tree(config: &InstallConfig, tree: &Path, timestamp: Option<&str>) -> Result<()> {
    if verify_media(tree, &config.arch, timestamp) {
        println!("{}: valid {} media", tree.display(), config.arch);
        Ok(())
    } else {
        bail!("'{}' is not valid {} media", tree.display(), config.arch)
    }
}

fn configure_sysroot(config: &InstallConfig, sysroot: &Path) -> Result<()> {
    if !sysroot.is_dir() {
        bail!("sysroot '{}' is not a directory", sysroot.display());
    }
    if config.ntp.init == InitSystem::Systemd {
        check_required_tools(SYSTEMD_TOOLS)?;
    }

    let timezone = ConfigureTimezoneTask::new(
        sysroot,
        config.timezone.zone.clone(),
        config.timezone.is_utc,
        config.arch.clone(),
    );
    let ntp = ConfigureNtpTask::new(sysroot, config.ntp.enabled, config.ntp.sources.clone())
        .with_service(&config.ntp.service)
        .with_config_path(&config.ntp.config_file);

    let tasks: [&dyn ConfigurationTask; 2] = [&timezone, &ntp];
    let services = config.ntp.init.manager();
    run_tasks(&tasks, services.as_ref())
        .with_context(|| format!("configuring sysroot '{}'", sysroot.display()))
}
