// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 数据集扩增端到端测试

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use yolo_toolkit::annotation;
use yolo_toolkit::{AugmentConfig, BoundingBox, DatasetLayout, ExpandConfig, Expander};

/// 在 `<root>/train` 下写入一张图片及其标注
fn write_source(layout: &DatasetLayout, stem: &str, with_label: bool) {
    fs::create_dir_all(&layout.images_dir).unwrap();
    fs::create_dir_all(&layout.labels_dir).unwrap();

    let img = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 128]));
    img.save(layout.images_dir.join(format!("{}.png", stem))).unwrap();
    if with_label {
        let boxes = [
            BoundingBox::new(0, 0.5, 0.5, 0.4, 0.4),
            BoundingBox::new(3, 0.3, 0.6, 0.2, 0.3),
        ];
        annotation::write(&layout.labels_dir.join(format!("{}.txt", stem)), &boxes).unwrap();
    }
}

fn expand(root: &Path, seed: u64) -> yolo_toolkit::ExpandReport {
    let config = ExpandConfig {
        layout: DatasetLayout::from_root(root),
        multiplier: 3,
        ..Default::default()
    };
    let augment = AugmentConfig {
        seed: Some(seed),
        ..Default::default()
    };
    Expander::new(config, &augment).run().unwrap()
}

fn names_in(dir: &Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(prefix))
        .collect();
    names.sort();
    names
}

#[test]
fn test_expander_outputs_per_source() {
    let root = tempfile::tempdir().unwrap();
    let layout = DatasetLayout::from_root(root.path());
    write_source(&layout, "a", true);
    write_source(&layout, "b", false);

    let report = expand(root.path(), 42);
    assert_eq!(report.sources, 2);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.copied, 1);
    assert_eq!(
        report.augmented + report.skipped_empty + report.failed,
        3,
        "{:?}",
        report
    );

    // 每个源最多 1 份原图 + 3 份增强
    let images = names_in(&layout.aug_images_dir, "a");
    let labels = names_in(&layout.aug_labels_dir, "a");
    assert!(images.len() <= 4);
    assert_eq!(images.len(), 1 + report.augmented);
    assert_eq!(labels.len(), images.len());
    assert!(images.contains(&"a.png".to_string()));
    for name in &images[1..] {
        assert!(name.starts_with("a_aug") && name.ends_with(".png"), "{}", name);
    }

    // 原图与标注原样复制
    assert_eq!(
        fs::read(layout.images_dir.join("a.png")).unwrap(),
        fs::read(layout.aug_images_dir.join("a.png")).unwrap()
    );
    assert_eq!(
        fs::read(layout.labels_dir.join("a.txt")).unwrap(),
        fs::read(layout.aug_labels_dir.join("a.txt")).unwrap()
    );

    // 缺少标注的图片不产生任何输出
    assert!(names_in(&layout.aug_images_dir, "b").is_empty());
    assert!(names_in(&layout.aug_labels_dir, "b").is_empty());

    // 写出的增强标注都是合法框
    for name in labels.iter().filter(|n| n.contains("_aug")) {
        let boxes = annotation::read(&layout.aug_labels_dir.join(name)).unwrap();
        assert!(!boxes.is_empty());
        assert!(boxes.iter().all(BoundingBox::is_valid));
        assert!(boxes.iter().all(|b| b.class_id == 0 || b.class_id == 3));
    }
}

#[test]
fn test_expander_is_reproducible_with_seed() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    for root in [first.path(), second.path()] {
        write_source(&DatasetLayout::from_root(root), "a", true);
    }
    let r1 = expand(first.path(), 7);
    let r2 = expand(second.path(), 7);
    assert_eq!(r1, r2);

    let l1 = DatasetLayout::from_root(first.path());
    let l2 = DatasetLayout::from_root(second.path());
    let names = names_in(&l1.aug_labels_dir, "a");
    assert_eq!(names, names_in(&l2.aug_labels_dir, "a"));
    for name in &names {
        assert_eq!(
            fs::read_to_string(l1.aug_labels_dir.join(name)).unwrap(),
            fs::read_to_string(l2.aug_labels_dir.join(name)).unwrap()
        );
    }
    for name in names_in(&l1.aug_images_dir, "a") {
        assert_eq!(
            fs::read(l1.aug_images_dir.join(&name)).unwrap(),
            fs::read(l2.aug_images_dir.join(&name)).unwrap()
        );
    }
}
