use super::*;

#[test]
fn uniform_answers_pick_their_dosha() {
    assert_eq!(
        classify(&["a", "a", "a", "a", "a"]).expect("should classify"),
        Dosha::Vata
    );
    assert_eq!(
        classify(&["b", "b", "b", "b", "b"]).expect("should classify"),
        Dosha::Pitta
    );
    assert_eq!(
        classify(&["c", "c", "c", "c", "c"]).expect("should classify"),
        Dosha::Kapha
    );
}

#[test]
fn majority_wins() {
    let dosha = classify(&["a", "a", "b", "a", "c"]).expect("should classify");
    assert_eq!(dosha, Dosha::Vata);

    let dosha = classify(&["c", "b", "c", "a", "c"]).expect("should classify");
    assert_eq!(dosha, Dosha::Kapha);
}

#[test]
fn ties_resolve_in_canonical_order() {
    // vata=2, pitta=2, kapha=1
    for _ in 0..10 {
        assert_eq!(
            classify(&["a", "b", "c", "a", "b"]).expect("should classify"),
            Dosha::Vata
        );
    }

    // pitta=2, kapha=2, vata=1
    assert_eq!(
        classify(&["c", "b", "a", "c", "b"]).expect("should classify"),
        Dosha::Pitta
    );
}

#[test]
fn empty_answers_are_rejected() {
    let empty: [&str; 0] = [];
    let result = classify(&empty);
    assert!(matches!(result, Err(AyurbotError::InvalidInput)));
}

#[test]
fn unrecognized_answers_are_skipped() {
    assert_eq!(
        classify(&["x", "b"]).expect("should classify"),
        Dosha::Pitta
    );

    let score = DoshaScore::from_answers(&["a", "", "maybe", "C", " b "]);
    assert_eq!(score.total(), 3);
    assert_eq!(score.count(Dosha::Vata), 1);
    assert_eq!(score.count(Dosha::Pitta), 1);
    assert_eq!(score.count(Dosha::Kapha), 1);
}

#[test]
fn only_unrecognized_answers_fall_back_to_tie_break() {
    assert_eq!(
        classify(&["?", "d", "none"]).expect("should classify"),
        Dosha::Vata
    );
}

#[test]
fn every_five_answer_sequence_classifies() {
    let symbols = ["a", "b", "c"];
    let mut seen = 0;

    for n in 0..243_usize {
        let mut rest = n;
        let mut answers = Vec::with_capacity(5);
        for _ in 0..5 {
            answers.push(symbols[rest % 3]);
            rest /= 3;
        }

        let score = DoshaScore::from_answers(&answers);
        assert_eq!(score.total(), 5);

        let dosha = classify(&answers).expect("five recognized answers always classify");
        let winning = score.count(dosha);
        for other in Dosha::ALL {
            assert!(score.count(other) <= winning);
        }
        seen += 1;
    }

    assert_eq!(seen, 243);
}

#[test]
fn score_counts_sum_to_recorded_answers() {
    let mut score = DoshaScore::new();
    assert_eq!(score.total(), 0);

    score.record(Answer::A);
    score.record(Answer::C);
    score.record(Answer::C);

    assert_eq!(score.total(), 3);
    assert_eq!(score.dominant(), Dosha::Kapha);
}

#[test]
fn answer_parsing() {
    assert_eq!(Answer::parse("a"), Some(Answer::A));
    assert_eq!(Answer::parse(" B\n"), Some(Answer::B));
    assert_eq!(Answer::parse("c"), Some(Answer::C));
    assert_eq!(Answer::parse("ab"), None);
    assert_eq!(Answer::parse(""), None);

    assert_eq!(Answer::from_option_index(2), Some(Answer::C));
    assert_eq!(Answer::from_option_index(3), None);
}

#[test]
fn dosha_names() {
    assert_eq!(Dosha::Vata.to_string(), "vata");
    assert_eq!(Dosha::Pitta.as_str(), "pitta");
    assert_eq!(Dosha::Kapha.to_string(), "kapha");
}
