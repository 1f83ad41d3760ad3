//! Rotating file writer tests against a real filesystem.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use flate2::read::GzDecoder;
use sl_writer::{
    backup_path, scan_backups, verify_gzip, AsyncWriter, FileWriterConfig, RotatingFileWriter,
    Sink,
};
use tempfile::TempDir;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn read_all(path: &Path) -> String {
    let mut text = String::new();
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        GzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
    } else {
        File::open(path).unwrap().read_to_string(&mut text).unwrap();
    }
    text
}

fn age_file(path: &Path, age: Duration) {
    let ft = FileTime::from_system_time(SystemTime::now() - age);
    filetime::set_file_times(path, ft, ft).unwrap();
}

#[test]
fn concurrent_writes_survive_rotation_and_compression() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("service.log");
    let config = FileWriterConfig::unlimited()
        .with_max_size_mb(1)
        .with_compress(true);
    let writer = Arc::new(RotatingFileWriter::open(&path, config).unwrap());

    let threads = 8;
    let per_thread = 2000;
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let writer = writer.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    let line = format!("t{:02}-{:06}-{}\n", t, i, "p".repeat(80));
                    writer.write(line.as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    writer.close().unwrap();

    let backups = scan_backups(&path).unwrap();
    assert!(!backups.is_empty());
    for backup in &backups {
        assert!(backup.compressed, "uncompressed backup left: {:?}", backup.path);
        verify_gzip(&backup.path).unwrap();
    }

    let mut lines = 0;
    for file in backups.iter().map(|b| b.path.clone()).chain([path.clone()]) {
        for line in read_all(&file).lines() {
            assert_eq!(line.len(), 3 + 1 + 6 + 1 + 80, "torn line: {}", line);
            lines += 1;
        }
    }
    assert_eq!(lines, threads * per_thread);
}

#[test]
fn rotation_keeps_newest_backups() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.log");
    for i in 1..=5 {
        fs::write(backup_path(&path, i, false), format!("backup {}\n", i)).unwrap();
    }

    let config = FileWriterConfig::unlimited().with_max_backups(3);
    let writer = RotatingFileWriter::open(&path, config).unwrap();
    writer.write(b"current\n").unwrap();
    let rotated = writer.rotate().unwrap();
    assert_eq!(rotated, backup_path(&path, 6, false));

    let left: Vec<u64> = scan_backups(&path)
        .unwrap()
        .iter()
        .map(|b| b.index)
        .collect();
    assert_eq!(left, vec![4, 5, 6]);
    assert_eq!(read_all(&rotated), "current\n");
}

#[test]
fn rotation_removes_expired_backups() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.log");
    let stale = backup_path(&path, 1, true);
    let recent = backup_path(&path, 2, false);
    let foreign = temp_dir.path().join("other_log_1.log");
    for p in [&stale, &recent, &foreign] {
        fs::write(p, b"old data").unwrap();
    }
    age_file(&stale, 40 * DAY);
    age_file(&foreign, 40 * DAY);
    age_file(&recent, 2 * DAY);

    let config = FileWriterConfig::unlimited().with_max_age(30 * DAY);
    let writer = RotatingFileWriter::open(&path, config).unwrap();
    writer.write(b"entry\n").unwrap();
    writer.rotate().unwrap();

    assert!(!stale.exists());
    assert!(recent.exists());
    assert!(foreign.exists());
    assert!(backup_path(&path, 3, false).exists());
}

#[test]
fn cleanup_without_rotation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.log");
    for i in 1..=4 {
        fs::write(backup_path(&path, i, false), b"x").unwrap();
    }

    let config = FileWriterConfig::unlimited().with_max_backups(1);
    let writer = RotatingFileWriter::open(&path, config).unwrap();
    assert_eq!(writer.cleanup().unwrap(), 3);
    assert!(backup_path(&path, 4, false).exists());
}

#[test]
fn async_writer_over_rotating_file_delivers_everything_on_close() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("async.log");
    let file = RotatingFileWriter::open(&path, FileWriterConfig::default()).unwrap();
    let writer = AsyncWriter::new(file, 2000).unwrap();

    for i in 0..1000 {
        writer.write(format!("line {}\n", i).as_bytes()).unwrap();
    }
    writer.close().unwrap();

    let stats = writer.stats();
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.written, 1000);

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1000);
    assert!(text.starts_with("line 0\n"));
    assert!(text.ends_with("line 999\n"));
}
