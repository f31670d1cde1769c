mod common;

use chrono::Duration;
use common::*;
use serde_json::json;

use longmem::archive::read_bundle;
use longmem::log_store::{day_file, RawRecord};
use longmem::{Period, SummaryKind};

fn summarize(h: &Harness, day: &str) {
    let period = Period::parse(SummaryKind::Daily, day).unwrap();
    store_summary(&h.engine.db, &period, &json!({ "type": "daily", "date": day, "highlights": ["x"] }));
}

#[test]
fn test_summarized_old_day_is_archived() {
    let h = harness(FakeCompletions::unreachable());
    let today = date("2025-03-01");
    let old = today - Duration::days(46);
    let old_key = old.format("%Y-%m-%d").to_string();
    let log_dir = &h.engine.config.log_dir;

    write_day(log_dir, &old_key, &[RawRecord::user("很久以前的对话"), RawRecord::assistant("好的")]);
    summarize(&h, &old_key);

    let report = h.engine.archive.sweep(today).unwrap();
    assert_eq!(report.archived, 1);
    assert_eq!(report.failed, 0);
    assert!(!day_file(log_dir, old).exists());

    let bundle = h.engine.config.archive_dir.join(format!("{}.jsonl.gz", old.format("%Y-%m")));
    let text = read_bundle(&bundle).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("很久以前的对话"));
}

#[test]
fn test_unsummarized_day_is_kept() {
    let h = harness(FakeCompletions::unreachable());
    let today = date("2025-03-01");
    let old = today - Duration::days(46);
    let log_dir = &h.engine.config.log_dir;

    write_day(log_dir, &old.format("%Y-%m-%d").to_string(), &[RawRecord::user("还没有摘要")]);

    let report = h.engine.archive.sweep(today).unwrap();
    assert_eq!(report.archived, 0);
    assert_eq!(report.awaiting_summary, 1);
    assert!(day_file(log_dir, old).exists());
    assert!(std::fs::read_dir(&h.engine.config.archive_dir).unwrap().next().is_none());
}

#[test]
fn test_day_inside_retention_is_kept() {
    let h = harness(FakeCompletions::unreachable());
    let today = date("2025-03-01");
    let recent = today - Duration::days(45);
    let recent_key = recent.format("%Y-%m-%d").to_string();

    write_day(&h.engine.config.log_dir, &recent_key, &[RawRecord::user("最近的对话")]);
    summarize(&h, &recent_key);

    let report = h.engine.archive.sweep(today).unwrap();
    assert_eq!(report.archived, 0);
    assert!(day_file(&h.engine.config.log_dir, recent).exists());
}

#[test]
fn test_days_of_one_month_share_a_bundle() {
    let h = harness(FakeCompletions::unreachable());
    let log_dir = &h.engine.config.log_dir;
    for day in ["2025-01-03", "2025-01-04", "2025-02-01"] {
        write_day(log_dir, day, &[RawRecord::user(format!("记录 {}", day))]);
        summarize(&h, day);
    }
    // unrelated files are left alone
    std::fs::write(log_dir.join("2025-01-03.daily.json"), "{}").unwrap();
    std::fs::write(log_dir.join("notes.txt"), "keep").unwrap();

    let report = h.engine.archive.sweep(date("2025-06-01")).unwrap();
    assert_eq!(report.archived, 3);

    let january = read_bundle(&h.engine.config.archive_dir.join("2025-01.jsonl.gz")).unwrap();
    assert_eq!(january.lines().collect::<Vec<_>>().len(), 2);
    assert!(january.find("2025-01-03").unwrap() < january.find("2025-01-04").unwrap());
    let february = read_bundle(&h.engine.config.archive_dir.join("2025-02.jsonl.gz")).unwrap();
    assert!(february.contains("记录 2025-02-01"));

    assert!(log_dir.join("2025-01-03.daily.json").exists());
    assert!(log_dir.join("notes.txt").exists());
}

#[test]
fn test_missing_log_dir_is_an_empty_sweep() {
    let h = harness(FakeCompletions::unreachable());
    std::fs::remove_dir_all(&h.engine.config.log_dir).unwrap();

    let report = h.engine.archive.sweep(date("2025-03-01")).unwrap();
    assert_eq!(report, longmem::ArchiveReport::default());
}

#[test]
fn test_leftover_day_file_is_not_archived_twice() {
    let h = harness(FakeCompletions::unreachable());
    let today = date("2025-03-01");
    let old = today - Duration::days(50);
    let old_key = old.format("%Y-%m-%d").to_string();
    let log_dir = &h.engine.config.log_dir;
    let records = [RawRecord::user("只归档一次")];

    write_day(log_dir, &old_key, &records);
    summarize(&h, &old_key);
    assert_eq!(h.engine.archive.sweep(today).unwrap().archived, 1);

    // the same file reappearing, as when its removal failed last time
    write_day(log_dir, &old_key, &records);
    let report = h.engine.archive.sweep(today).unwrap();
    assert_eq!(report.archived, 1);
    assert_eq!(report.failed, 0);
    assert!(!day_file(log_dir, old).exists());

    let text = read_bundle(&h.engine.archive.bundle_path(old)).unwrap();
    assert_eq!(text.lines().count(), 1);
}

#[test]
fn test_huge_retention_archives_nothing() {
    let h = harness_with(FakeCompletions::unreachable(), |c| c.keep_raw_days = u32::MAX);
    write_day(&h.engine.config.log_dir, "2025-01-03", &[RawRecord::user("保留")]);
    summarize(&h, "2025-01-03");

    let report = h.engine.archive.sweep(date("2025-03-01")).unwrap();
    assert_eq!(report, longmem::ArchiveReport::default());
    assert!(day_file(&h.engine.config.log_dir, date("2025-01-03")).exists());
}
