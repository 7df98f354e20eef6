use scriptpipe::{echo, file, find_files, if_exists, list_files, new_pipe, slice, PipeError};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn path_line(path: &Path) -> String {
    format!("{}\n", path.display())
}

#[test]
fn test_echo_and_new_pipe() {
    assert_eq!(echo("exact text").string().unwrap(), "exact text");
    assert_eq!(new_pipe().string().unwrap(), "");
}

#[test]
fn test_slice() {
    assert_eq!(slice(["a", "b"]).string().unwrap(), "a\nb\n");
    assert_eq!(slice(Vec::<String>::new()).string().unwrap(), "");
}

#[test]
fn test_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("in.txt");
    fs::write(&path, "contents\n").unwrap();

    assert_eq!(file(&path).string().unwrap(), "contents\n");
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does-not-exist");

    let pipe = file(&path);
    assert!(matches!(pipe.error(), Some(PipeError::Path { .. })));

    let (data, err) = pipe.drain();
    assert!(data.is_empty());
    let err = err.unwrap();
    assert!(err.to_string().contains("does-not-exist"), "{err}");
}

#[test]
fn test_if_exists() {
    let dir = tempdir().unwrap();

    assert!(if_exists(dir.path()).wait().is_ok());
    assert!(if_exists(dir.path().join("nope")).wait().is_err());
}

#[test]
fn test_list_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b.txt"), "").unwrap();
    fs::write(dir.path().join("a.txt"), "").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();

    let listed = list_files(dir.path()).string().unwrap();
    let expected = [
        path_line(&dir.path().join("a.txt")),
        path_line(&dir.path().join("b.txt")),
        path_line(&dir.path().join("sub")),
    ]
    .concat();
    assert_eq!(listed, expected);
}

#[test]
fn test_list_files_single_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("only.txt");
    fs::write(&path, "").unwrap();

    assert_eq!(list_files(&path).string().unwrap(), path_line(&path));
}

#[test]
fn test_list_files_missing() {
    let dir = tempdir().unwrap();
    assert!(list_files(dir.path().join("missing")).error().is_some());
}

#[test]
fn test_find_files() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("a/y")).unwrap();
    fs::write(root.join("a/x.txt"), "").unwrap();
    fs::write(root.join("a/y/z.txt"), "").unwrap();
    fs::write(root.join("b.txt"), "").unwrap();

    let found = find_files(root).string().unwrap();
    let expected = [
        path_line(&root.join("a/x.txt")),
        path_line(&root.join("a/y/z.txt")),
        path_line(&root.join("b.txt")),
    ]
    .concat();
    assert_eq!(found, expected);
}

#[test]
fn test_find_files_missing_root() {
    let dir = tempdir().unwrap();
    let err = find_files(dir.path().join("missing")).wait().unwrap_err();
    assert!(matches!(err, PipeError::Walk(_)));
}

#[test]
fn test_find_then_concat() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("1.txt"), "one\n").unwrap();
    fs::write(dir.path().join("2.txt"), "two\n").unwrap();

    let out = find_files(dir.path()).concat().string().unwrap();
    assert_eq!(out, "one\ntwo\n");
}
