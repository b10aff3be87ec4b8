use super::write_fixture;
use crate::assert_err;
use crate::data::{DataError, PersonalityCaptions, Split};

#[test]
fn test_split_parsing() {
    assert_eq!("train".parse::<Split>().unwrap(), Split::Train);
    assert_eq!("val".parse::<Split>().unwrap(), Split::Val);
    assert_eq!(Split::Test.to_string(), "test");
    assert_err!("dev".parse::<Split>(), DataError::UnknownSplit("dev"));
}

#[test]
fn test_image_url_layout() {
    assert_eq!(
        PersonalityCaptions::image_url("abcdef123"),
        "https://multimedia-commons.s3-us-west-2.amazonaws.com/data/images/abc/def/abcdef123.jpg"
    );
}

#[test]
fn test_load_excludes_records_without_image() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_fixture(dir.path());

    let train = dataset.load(Split::Train).unwrap();
    assert_eq!(train.len(), 2);
    assert_eq!(train[0].style, "Happy");
    assert_eq!(train[0].caption, "A sunny day at the beach!");
    assert!(train[0].additional_captions.is_empty());
    assert_eq!(train[1].additional_captions, vec!["so cold".to_string()]);
    assert_eq!(train[1].image_path, dir.path().join("images").join("bbb222.jpg"));

    assert_eq!(dataset.load_by_name("val").unwrap().len(), 1);
    assert_err!(dataset.load_by_name("dev"), DataError::UnknownSplit(_));
}

#[test]
fn test_style_vocabulary_from_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_fixture(dir.path());
    let styles = dataset.style_vocabulary().unwrap();
    assert_eq!(styles.len(), 4);
    assert_eq!(styles.id("Happy"), 1);
    assert_eq!(styles.id("Curious"), 3);
    assert_eq!(styles.id("Sarcastic"), 0);
    assert_eq!(styles.name(2), "Gloomy");
}

#[test]
fn test_style_vocabulary_fitted_from_train_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_fixture(dir.path());
    std::fs::remove_file(dir.path().join("personalities.txt")).unwrap();
    let styles = dataset.style_vocabulary().unwrap();
    assert_eq!(styles.len(), 3);
    assert_eq!(styles.id("Happy"), 1);
    assert_eq!(styles.id("Gloomy"), 2);
    assert_eq!(styles.id("Curious"), 0);
}
