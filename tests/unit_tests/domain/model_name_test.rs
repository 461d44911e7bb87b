use audioscribe::domain::ModelName;

#[test]
fn given_common_model_names_when_parsed_then_accepted() {
    for raw in ["whisper-1", "large-v3", "gpt-4o-mini-transcribe", "tiny.en", "org:model_v2"] {
        assert_eq!(raw.parse::<ModelName>().unwrap().as_str(), raw);
    }
}

#[test]
fn given_path_like_name_when_parsed_then_rejected() {
    assert!("openai/whisper".parse::<ModelName>().is_err());
}

#[test]
fn given_padded_name_when_parsed_then_whitespace_is_trimmed() {
    let model: ModelName = "  whisper-1 ".parse().unwrap();

    assert_eq!(model.as_str(), "whisper-1");
    assert_eq!(model.to_string(), "whisper-1");
}

#[test]
fn given_blank_name_when_parsed_then_rejected() {
    assert!("   ".parse::<ModelName>().is_err());
}

#[test]
fn given_name_with_shell_characters_when_parsed_then_rejected() {
    assert!("whisper; rm -rf".parse::<ModelName>().is_err());
}

#[test]
fn given_overlong_name_when_parsed_then_rejected() {
    let raw = "m".repeat(65);

    let err = raw.parse::<ModelName>().unwrap_err();

    assert!(err.contains("64"));
}
