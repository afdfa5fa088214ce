use anyhow::Result;

use super::Transcript;
use crate::domain::models::Message;
use crate::domain::models::Role;

#[test]
fn it_streams_into_the_open_message() -> Result<()> {
    let mut transcript = Transcript::default();
    transcript.push_user("hi")?;
    transcript.open_assistant()?;

    assert!(transcript.is_open());
    assert_eq!(transcript.append_open("Hel"), Some("Hel"));
    assert_eq!(transcript.append_open("lo"), Some("Hello"));
    assert_eq!(transcript.open_content(), Some("Hello"));

    transcript.close();
    assert!(!transcript.is_open());
    assert_eq!(transcript.append_open("!"), None);
    assert_eq!(transcript.last(), Some(&Message::assistant("Hello")));

    return Ok(());
}

#[test]
fn it_only_allows_one_open_message() -> Result<()> {
    let mut transcript = Transcript::default();
    transcript.open_assistant()?;

    assert!(transcript.open_assistant().is_err());
    assert!(transcript.push_user("again").is_err());
    assert_eq!(transcript.len(), 1);

    return Ok(());
}

#[test]
fn it_refuses_to_clear_while_open() -> Result<()> {
    let mut transcript = Transcript::from_messages(vec![Message::user("a")]);
    transcript.open_assistant()?;
    assert!(transcript.clear().is_err());

    transcript.close();
    transcript.clear()?;
    assert!(transcript.is_empty());

    return Ok(());
}

#[test]
fn it_only_mutates_the_tail() -> Result<()> {
    let mut transcript = Transcript::default();
    let mut snapshots: Vec<Vec<Message>> = vec![];

    for idx in 0..3 {
        transcript.push_user(&format!("question {idx}"))?;
        transcript.open_assistant()?;
        transcript.append_open("answer ");
        transcript.append_open(&idx.to_string());
        transcript.close();
        snapshots.push(transcript.messages().to_vec());
    }

    for window in snapshots.windows(2) {
        assert!(window[1].len() >= window[0].len());
        assert_eq!(&window[1][..window[0].len()], window[0].as_slice());
    }
    let users = transcript
        .messages()
        .iter()
        .filter(|msg| {
            return msg.role == Role::User;
        })
        .count();
    assert_eq!(users, 3);
    assert_eq!(transcript.len(), 6);

    return Ok(());
}
