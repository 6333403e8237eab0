use chrono::{Datelike, Timelike};
use mail_dissect::{
    mail_from_text, parse_mail, thread_from_mail, thread_from_text, ParseMode, Thread,
};

#[test]
fn test_single_segment_fields() {
    let text = "From: a@x.com\nSent: Jan 1 2020\nTo: b@y.com\nSubject: hi\nhello";

    let thread = thread_from_text(text).unwrap();

    assert_eq!(thread.len(), 1);
    let mail = &thread.entries[0];
    assert_eq!(mail.header.from.as_ref().unwrap().address, "a@x.com");
    assert_eq!(mail.header.to[0].address, "b@y.com");
    assert_eq!(mail.header.subject.as_deref(), Some("hi"));
    assert_eq!(mail.body.plain_text(), Some("hello"));
    // "Jan 1 2020" matches neither locale pattern; the miss is silent
    assert!(mail.header.received.is_none());
}

#[test]
fn test_no_marker_yields_no_thread() {
    assert!(thread_from_text("just a plain reply, no headers").is_none());
    assert!(thread_from_text("").is_none());
}

#[test]
fn test_two_segments_in_discovery_order() {
    let text = "From: first@x.com\nSent: x\nTo: b@y.com\nSubject: one\nbody one\n\
                From: second@x.com\nSent: x\nTo: b@y.com\nSubject: two\nbody two";

    let thread = thread_from_text(text).unwrap();

    assert_eq!(thread.len(), 2);
    assert!(!thread.ordered);
    assert_eq!(
        thread.entries[0].header.from.as_ref().unwrap().address,
        "first@x.com"
    );
    assert_eq!(
        thread.entries[1].header.from.as_ref().unwrap().address,
        "second@x.com"
    );
    assert_eq!(thread.entries[1].header.subject.as_deref(), Some("two"));
}

#[test]
fn test_italian_locale_segment() {
    let text = "Da: Mario Rossi <mario@esempio.it>\n\
                Inviato: lunedì 5 settembre 2022 10:30\n\
                A: luigi@esempio.it\n\
                Oggetto: Saluti\n\
                Ciao a tutti";

    let thread = thread_from_text(text).unwrap();

    assert_eq!(thread.len(), 1);
    let mail = &thread.entries[0];
    let from = mail.header.from.as_ref().unwrap();
    assert_eq!(from.address, "mario@esempio.it");
    assert_eq!(from.name.as_deref(), Some("Mario Rossi"));
    assert_eq!(mail.header.to[0].address, "luigi@esempio.it");
    assert_eq!(mail.header.subject.as_deref(), Some("Saluti"));

    let received = mail.header.received.unwrap();
    assert_eq!(
        (received.year(), received.month(), received.day()),
        (2022, 9, 5)
    );
    assert_eq!((received.hour(), received.minute()), (10, 30));
}

#[test]
fn test_fallback_date_pattern() {
    let text = "From: a@x.com\n\
                Sent: Monday, September 5, 2022 10:30:00 AM\n\
                To: b@y.com\n\
                Subject: s\n\
                body";

    let thread = thread_from_text(text).unwrap();

    let received = thread.entries[0].header.received.unwrap();
    assert_eq!(
        (received.year(), received.month(), received.day()),
        (2022, 9, 5)
    );
    assert_eq!((received.hour(), received.minute()), (10, 30));
}

#[test]
fn test_semicolon_addresses_with_escaped_brackets() {
    let text = "From: a@x.com\nSent: x\nTo: John &lt;j@x.com&gt;; k@y.com\nSubject: s\nbody";

    let thread = thread_from_text(text).unwrap();

    let to = &thread.entries[0].header.to;
    assert_eq!(to.len(), 2);
    assert_eq!(to[0].address, "j@x.com");
    assert_eq!(to[0].name.as_deref(), Some("John"));
    assert_eq!(to[1].address, "k@y.com");
}

#[test]
fn test_cc_extraction() {
    let text = "From: a@x.com\nSent: x\nTo: b@y.com\nCc: c@z.com\nSubject: s\nbody";

    let thread = thread_from_text(text).unwrap();

    let mail = &thread.entries[0];
    assert_eq!(mail.header.to[0].address, "b@y.com");
    assert_eq!(mail.header.cc.len(), 1);
    assert_eq!(mail.header.cc[0].address, "c@z.com");
}

#[test]
fn test_confidential_footer_stripped() {
    let text = "From: a@x.com\nSent: x\nTo: b@y.com\nSubject: s\nhello\nC1 Confidential";

    let mail = mail_from_text(text);

    assert_eq!(mail.body.plain_text(), Some("hello"));
}

#[test]
fn test_segment_without_resolvable_sender_is_kept() {
    // No "Sent: " closing marker, so sender extraction misses silently
    let text = "From: someone\nTo: b@y.com\nSubject: s\nbody";

    let thread = thread_from_text(text).unwrap();

    assert_eq!(thread.len(), 1);
    assert!(thread.entries[0].header.from.is_none());
}

#[test]
fn test_sort_ascending_and_descending() {
    let t1 = "From: a@x.com\nSent: Monday, September 5, 2022 09:00:00 AM\nTo: b@y.com\nSubject: t1\nx";
    let t2 = "From: a@x.com\nSent: Tuesday, September 6, 2022 09:00:00 AM\nTo: b@y.com\nSubject: t2\nx";
    let t3 = "From: a@x.com\nSent: Wednesday, September 7, 2022 09:00:00 AM\nTo: b@y.com\nSubject: t3\nx";

    let mut thread = Thread::new();
    for text in [t2, t1, t3] {
        thread.add_mail(mail_from_text(text));
    }
    assert!(!thread.ordered);

    thread.sort(false);

    assert!(thread.ordered);
    let subjects: Vec<_> = thread
        .entries
        .iter()
        .map(|m| m.header.subject.as_deref().unwrap())
        .collect();
    assert_eq!(subjects, ["t1", "t2", "t3"]);

    thread.sort(true);
    let subjects: Vec<_> = thread
        .entries
        .iter()
        .map(|m| m.header.subject.as_deref().unwrap())
        .collect();
    assert_eq!(subjects, ["t3", "t2", "t1"]);
}

#[test]
fn test_thread_from_mail_collects_quoted_chain() {
    let raw = b"From: top@example.com\r\n\
                To: b@example.com\r\n\
                Subject: latest\r\n\
                \r\n\
                latest reply text\n\
                From: older@example.com\n\
                Sent: x\n\
                To: top@example.com\n\
                Subject: the original\n\
                original text";

    let mail = parse_mail(raw, ParseMode::Structured).unwrap();
    let thread = thread_from_mail(&mail);

    // The enclosing mail plus one reconstructed quoted segment
    assert_eq!(thread.len(), 2);
    assert_eq!(
        thread.entries[0].header.from.as_ref().unwrap().address,
        "top@example.com"
    );
    assert_eq!(
        thread.entries[1].header.from.as_ref().unwrap().address,
        "older@example.com"
    );
    assert_eq!(
        thread.entries[1].header.subject.as_deref(),
        Some("the original")
    );
}

#[test]
fn test_thread_from_mail_includes_nested_mail_attachments() {
    let raw = b"From: outer@example.com\r\n\
                To: someone@example.com\r\n\
                Subject: carrier\r\n\
                Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
                \r\n\
                --sep\r\n\
                Content-Type: text/plain\r\n\
                \r\n\
                no markers here\r\n\
                --sep\r\n\
                Content-Type: message/rfc822\r\n\
                Content-Disposition: attachment; filename=\"old.eml\"\r\n\
                \r\n\
                From: nested@example.com\r\n\
                To: outer@example.com\r\n\
                Subject: nested\r\n\
                \r\n\
                nested body, no markers\r\n\
                --sep--\r\n";

    let mail = parse_mail(raw, ParseMode::Structured).unwrap();
    let thread = thread_from_mail(&mail);

    assert_eq!(thread.len(), 2);
    let senders: Vec<_> = thread
        .entries
        .iter()
        .map(|m| m.header.from.as_ref().unwrap().address.as_str())
        .collect();
    assert!(senders.contains(&"outer@example.com"));
    assert!(senders.contains(&"nested@example.com"));
}

#[test]
fn test_thread_id_stamped_on_add() {
    let mut thread = Thread::with_id("conv-7");
    thread.add_mail(mail_from_text("From: a@x.com\nTo: b@y.com\nSubject: s\nx"));

    assert_eq!(thread.entries[0].thread_id.as_deref(), Some("conv-7"));
}

#[test]
fn test_set_id_restamps_existing_entries() {
    let mut thread = Thread::new();
    thread.add_mail(mail_from_text("From: a@x.com\nTo: b@y.com\nSubject: s\nx"));
    assert!(thread.entries[0].thread_id.is_none());

    thread.set_id("conv-9");

    assert_eq!(thread.id.as_deref(), Some("conv-9"));
    assert_eq!(thread.entries[0].thread_id.as_deref(), Some("conv-9"));
}
