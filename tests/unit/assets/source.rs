use super::*;

#[test]
fn normalize_rel_path_cleans_and_rejects() {
    assert_eq!(normalize_rel_path("a/./b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("a\\b\\c.svg").unwrap(), "a/b/c.svg");
    assert_eq!(normalize_rel_path("./x//y.png").unwrap(), "x/y.png");

    assert!(normalize_rel_path("").is_err());
    assert!(normalize_rel_path("/etc/passwd").is_err());
    assert!(normalize_rel_path("C:/assets/x.png").is_err());
    assert!(normalize_rel_path("../secret.png").is_err());
    assert!(normalize_rel_path("a/../../b.png").is_err());
    assert!(normalize_rel_path("./.").is_err());
}

#[test]
fn fs_source_reads_relative_to_root() {
    let dir = PathBuf::from("target").join("fs_source_unit");
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    std::fs::write(dir.join("sub").join("blob.bin"), b"errl").unwrap();

    let src = FsAssetSource::new(&dir);
    assert_eq!(src.root(), dir.as_path());
    assert_eq!(src.fetch("sub/blob.bin").unwrap(), b"errl");
    assert!(src.fetch("sub/missing.bin").is_err());
    assert!(matches!(
        src.fetch("../escape.bin").unwrap_err(),
        SceneError::Asset(_)
    ));
}
