use copland::{
    phrase::{copy_bounded, eval_bounds, match_phrase},
    ArgValue, CoplandPhrase, PhraseArg, PhraseSpecPair, Role,
};
use uuid::Uuid;

fn str_template(term: &str, name: &str, bound: &str) -> CoplandPhrase {
    CoplandPhrase::base(term, vec![PhraseArg::new(name, ArgValue::String(bound.into()))])
}

#[test]
fn string_argument_within_bounds() {
    let template = str_template("att", "arg", "[0-9]+");

    let phrase = CoplandPhrase::parse("att:arg=42", &template).unwrap();
    assert_eq!(phrase.role, Role::Actual);
    assert_eq!(
        phrase.args,
        vec![PhraseArg::new("arg", ArgValue::String("42".into()))],
    );
    assert!(eval_bounds(&phrase, &template).is_ok());

    let phrase = CoplandPhrase::parse("att:arg=abc", &template).unwrap();
    assert!(eval_bounds(&phrase, &template).is_err());
}

#[test]
fn arguments_resolve_by_name_and_keep_encounter_order() {
    let template = CoplandPhrase::base(
        "m",
        vec![
            PhraseArg::new("p", ArgValue::Integer(0)),
            PhraseArg::new("q", ArgValue::Place(String::new())),
        ],
    );

    let phrase = CoplandPhrase::parse("m:q=7,p=3", &template).unwrap();

    assert_eq!(phrase.find_arg("p").unwrap().value, ArgValue::Integer(3));
    assert_eq!(phrase.find_arg("q").unwrap().value, ArgValue::Place("7".into()));
    assert_eq!(phrase.to_string(), "m:q=7,p=3");
}

#[test]
fn serialise_then_parse_is_identity() {
    let template = CoplandPhrase::base(
        "m",
        vec![
            PhraseArg::new("p", ArgValue::Integer(0)),
            PhraseArg::new("q", ArgValue::Place(String::new())),
        ],
    );

    let phrase = CoplandPhrase::parse("m:q=0042,p=-17", &template).unwrap();
    let reparsed = CoplandPhrase::parse(&phrase.to_string(), &template).unwrap();

    assert_eq!(reparsed, phrase);
}

#[test]
fn match_phrase_picks_first_bounding_template() {
    let pairs = vec![
        PhraseSpecPair::new(str_template("att", "arg", "^cpu$"), Uuid::nil()),
        PhraseSpecPair::new(str_template("att", "arg", "^[a-z]+$"), Uuid::nil()),
    ];

    let phrase = CoplandPhrase::actual(
        "att",
        vec![PhraseArg::new("arg", ArgValue::String("mem".into()))],
    );

    let matched = match_phrase(&phrase, &pairs).unwrap();
    assert_eq!(matched, &pairs[1].copl);

    let phrase = CoplandPhrase::actual(
        "att",
        vec![PhraseArg::new("arg", ArgValue::String("42".into()))],
    );
    assert!(match_phrase(&phrase, &pairs).is_err());
}

#[test]
fn filtering_preserves_order_and_membership() {
    let phrases: Vec<CoplandPhrase> = ["a", "deny", "b", "c"]
        .into_iter()
        .map(|v| {
            CoplandPhrase::actual(
                "att",
                vec![PhraseArg::new("arg", ArgValue::String(v.into()))],
            )
        })
        .collect();

    let bounders = vec![str_template("att", "arg", "^[abc]$")];
    let bounded = copy_bounded(&phrases, &bounders);

    assert_eq!(bounded, vec![phrases[0].clone(), phrases[2].clone(), phrases[3].clone()]);
    for phrase in &bounded {
        assert!(phrases.contains(phrase));
    }
}
