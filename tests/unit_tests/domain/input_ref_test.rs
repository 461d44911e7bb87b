use uuid::Uuid;

use audioscribe::domain::InputRef;

#[test]
fn given_plain_filename_when_building_upload_ref_then_prefixes_upload_id() {
    let id = Uuid::new_v4();
    let input_ref = InputRef::for_upload(id, "lecture.mp3");
    assert_eq!(input_ref.as_str(), format!("{}/lecture.mp3", id));
}

#[test]
fn given_path_traversal_when_building_upload_ref_then_keeps_only_basename() {
    let id = Uuid::new_v4();
    let input_ref = InputRef::for_upload(id, "../../etc/passwd");
    assert_eq!(input_ref.as_str(), format!("{}/passwd", id));
}

#[test]
fn given_odd_characters_when_building_upload_ref_then_replaces_them() {
    let id = Uuid::new_v4();
    let input_ref = InputRef::for_upload(id, "my talk (final).wav");
    assert_eq!(input_ref.as_str(), format!("{}/my_talk__final_.wav", id));
}

#[test]
fn given_empty_filename_when_building_upload_ref_then_uses_fallback_name() {
    let id = Uuid::new_v4();
    assert_eq!(
        InputRef::for_upload(id, "..").as_str(),
        format!("{}/audio", id)
    );
    assert_eq!(InputRef::for_upload(id, "").as_str(), format!("{}/audio", id));
}
