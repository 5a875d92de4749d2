use std::path::Path;

use super::error::PlatformQueryError;
use super::types::DiskSample;

#[cfg(unix)]
pub const DISK_SOURCE: &str = "libc::statvfs";
#[cfg(not(unix))]
pub const DISK_SOURCE: &str = "sysinfo::disks";

/// Space used on the volume holding `path`.
#[cfg(unix)]
pub fn sample_disk(path: &Path) -> Result<DiskSample, PlatformQueryError> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        PlatformQueryError::Malformed("volume path", "interior NUL byte".to_string())
    })?;

    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::NotFound {
            return Err(PlatformQueryError::NoVolume(path.to_path_buf()));
        }
        return Err(PlatformQueryError::Io("statvfs", err));
    }
    let stat = unsafe { stat.assume_init() };

    let fragment = stat.f_frsize as u64;
    let total = (stat.f_blocks as u64).saturating_mul(fragment);
    let free = (stat.f_bfree as u64).saturating_mul(fragment);
    Ok(DiskSample::from_totals(total, free))
}

#[cfg(not(unix))]
pub fn sample_disk(path: &Path) -> Result<DiskSample, PlatformQueryError> {
    use sysinfo::Disks;

    if !path.exists() {
        return Err(PlatformQueryError::NoVolume(path.to_path_buf()));
    }

    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .ok_or_else(|| PlatformQueryError::NoVolume(path.to_path_buf()))?;

    Ok(DiskSample::from_totals(
        disk.total_space(),
        disk.available_space(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_is_zero_percent() {
        let sample = DiskSample::from_totals(0, 0);
        assert_eq!(sample.used_percent, 0.0);
        assert_eq!(sample, DiskSample::default());
    }

    #[test]
    fn used_is_total_minus_free() {
        let sample = DiskSample::from_totals(1_000, 250);
        assert_eq!(sample.used_bytes, 750);
        assert_eq!(sample.total_bytes, 1_000);
        assert!((sample.used_percent - 75.0).abs() < 1e-4);
    }

    #[test]
    fn existing_directory_has_bounded_usage() {
        let dir = tempfile::tempdir().expect("temp dir");
        let sample = sample_disk(dir.path()).expect("statvfs on temp dir");
        assert!(sample.total_bytes > 0);
        assert!(sample.used_bytes <= sample.total_bytes);
        assert!((0.0..=100.0).contains(&sample.used_percent));
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("definitely").join("not").join("here");
        match sample_disk(&missing) {
            Err(PlatformQueryError::NoVolume(path)) => assert_eq!(path, missing),
            other => panic!("expected NoVolume, got {:?}", other),
        }
    }
}
