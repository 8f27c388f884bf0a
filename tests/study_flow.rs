mod common;

use common::{init_logging, pdf_with_pages, EchoBackend, FailingBackend, ProseBackend};
use preppal_lib::doc_processor::{self, ExtractionError, PdfChunk};
use preppal_lib::session::{Mode, Role, ANSWER_ERROR_MESSAGE, UPLOAD_ERROR_MESSAGE, VIEW_ERROR_MESSAGE};
use preppal_lib::views::DerivedView;
use preppal_lib::workspace::{Workspace, WorkspaceError};
use std::io::Write;
use std::path::Path;

const MODEL: &str = "test-model";

fn pdf_file(pages: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    file.write_all(&pdf_with_pages(pages)).unwrap();
    file
}

async fn loaded(pages: &[&str]) -> (Workspace, tempfile::NamedTempFile) {
    let file = pdf_file(pages);
    let mut ws = Workspace::new();
    ws.upload(file.path()).await.unwrap();
    (ws, file)
}

#[test]
fn test_pdf_pages_extracted_in_order() {
    init_logging();
    let bytes = pdf_with_pages(&["Alpha", "Bravo", "Charlie"]);
    let chunks = doc_processor::extract_pages(&bytes).unwrap();

    assert_eq!(chunks.len(), 3);
    let numbers: Vec<u32> = chunks.iter().map(|c| c.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(chunks[0].content.contains("Alpha"));
    assert!(chunks[1].content.contains("Bravo"));
    assert!(chunks[2].content.contains("Charlie"));
}

#[test]
fn test_pdf_file_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("biology.pdf");
    std::fs::write(&path, pdf_with_pages(&["Mitosis", "Meiosis"])).unwrap();

    let document = doc_processor::load_document(&path).unwrap();
    assert_eq!(document.file_name, "biology.pdf");
    assert_eq!(document.page_count(), 2);
}

#[test]
fn test_pdf_without_extension_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("textbook");
    std::fs::write(&path, pdf_with_pages(&["A", "B", "C"])).unwrap();

    let document = doc_processor::load_document(&path).unwrap();
    assert_eq!(document.file_name, "textbook");
    assert_eq!(document.page_count(), 3);
}

#[test]
fn test_truncated_pdf_fails_to_extract() {
    let bytes = pdf_with_pages(&["Alpha"]);
    assert!(doc_processor::extract_pages(&bytes[..bytes.len() / 3]).is_err());
}

#[tokio::test]
async fn test_upload_greets_and_numbers_pages() {
    init_logging();
    let (ws, file) = loaded(&["Alpha", "Bravo", "Charlie"]).await;
    let session = ws.session();

    let document = session.document().unwrap();
    assert_eq!(
        document.chunks,
        vec![
            PdfChunk::new(1, "Alpha"),
            PdfChunk::new(2, "Bravo"),
            PdfChunk::new(3, "Charlie"),
        ]
    );
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].role, Role::Model);
    let name = file.path().file_name().unwrap().to_str().unwrap();
    assert!(session.messages()[0].content.contains(name));
    assert!(!session.is_loading_document());
    assert!(session.error().is_none());
}

#[tokio::test]
async fn test_three_page_pdf_example() {
    let (mut ws, _file) = loaded(&["A", "B", "C"]).await;
    assert_eq!(
        ws.session().document().unwrap().chunks,
        vec![PdfChunk::new(1, "A"), PdfChunk::new(2, "B"), PdfChunk::new(3, "C")]
    );

    ws.ask(&EchoBackend::default(), MODEL, "What is on page 2?")
        .await
        .unwrap();
    let answer = ws.session().messages().last().unwrap();
    assert_eq!(answer.source.as_ref().and_then(|s| s.page_number), Some(2));
}

#[tokio::test]
async fn test_text_file_upload_is_rejected() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    file.write_all(b"Chapter 1\x0cChapter 2").unwrap();
    let mut ws = Workspace::new();

    let result = ws.upload(file.path()).await;
    assert!(matches!(result, Err(WorkspaceError::Extraction(_))));
    assert!(ws.session().document().is_none());
    assert!(ws.session().messages().is_empty());
    assert_eq!(ws.session().error(), Some(UPLOAD_ERROR_MESSAGE));
}

#[tokio::test]
async fn test_answer_cites_the_page_it_came_from() {
    let (mut ws, _file) = loaded(&["Alpha", "Bravo", "Charlie"]).await;
    let backend = EchoBackend::default();

    ws.ask(&backend, MODEL, "What is on page 2?").await.unwrap();
    let answer = ws.session().messages().last().unwrap();
    assert_eq!(answer.role, Role::Model);
    assert!(answer.content.contains("Bravo"));
    let source = answer.source.clone().unwrap();
    assert_eq!(source.page_number, Some(2));
    assert_eq!(source.content, "Bravo");

    let prompt = backend.last_prompt();
    assert!(prompt.contains("Page 1:\nAlpha\n\n---\n\nPage 2:\nBravo\n\n---\n\nPage 3:\nCharlie"));
}

#[tokio::test]
async fn test_each_question_adds_two_turns() {
    let (mut ws, _file) = loaded(&["Alpha", "Bravo"]).await;
    let backend = EchoBackend::default();

    for (i, question) in ["What is on page 1?", "And page 2?", "What about page 9?"]
        .iter()
        .enumerate()
    {
        ws.ask(&backend, MODEL, question).await.unwrap();
        assert_eq!(ws.session().messages().len(), 1 + 2 * (i + 1));
    }

    let last = ws.session().messages().last().unwrap();
    assert!(last.source.is_none());

    // Follow-ups see the earlier turns
    let prompt = backend.last_prompt();
    assert!(prompt.contains("Student: What is on page 1?"));
    assert!(prompt.contains("Assistant: Page 1 says: Alpha"));
}

#[tokio::test]
async fn test_failed_question_adds_one_error_turn() {
    let (mut ws, _file) = loaded(&["Alpha", "Bravo"]).await;
    let chunks_before = ws.session().document().unwrap().chunks.clone();

    let result = ws.ask(&FailingBackend, MODEL, "What is on page 1?").await;
    assert!(matches!(result, Err(WorkspaceError::Query(_))));

    let messages = ws.session().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert!(messages[2].is_error);
    assert_eq!(messages[2].content, ANSWER_ERROR_MESSAGE);
    assert!(!ws.session().is_answering());
    assert_eq!(ws.session().document().unwrap().chunks, chunks_before);

    // The session recovers on the next question
    let backend = EchoBackend::default();
    ws.ask(&backend, MODEL, "What is on page 1?").await.unwrap();
    assert_eq!(ws.session().messages().len(), 5);
    assert!(ws.session().error().is_none());
    assert!(!backend.last_prompt().contains(ANSWER_ERROR_MESSAGE));
}

#[tokio::test]
async fn test_prose_reply_is_an_error_turn() {
    let (mut ws, _file) = loaded(&["Alpha"]).await;
    let result = ws.ask(&ProseBackend, MODEL, "What is this?").await;
    assert!(matches!(result, Err(WorkspaceError::Query(_))));
    assert!(ws.session().messages().last().unwrap().is_error);
}

#[tokio::test]
async fn test_failed_upload_clears_previous_document() {
    let (mut ws, _file) = loaded(&["Alpha"]).await;
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.pdf");
    std::fs::write(&broken, b"not a pdf at all").unwrap();

    let result = ws.upload(&broken).await;
    assert!(matches!(result, Err(WorkspaceError::Extraction(_))));
    assert!(ws.session().document().is_none());
    assert!(ws.session().messages().is_empty());
    assert_eq!(ws.session().error(), Some(UPLOAD_ERROR_MESSAGE));
    assert!(matches!(
        ws.ask(&EchoBackend::default(), MODEL, "anything?").await,
        Err(WorkspaceError::NoDocument)
    ));
}

#[tokio::test]
async fn test_missing_file_is_extraction_error() {
    let mut ws = Workspace::new();
    let result = ws.upload(Path::new("/definitely/not/here.pdf")).await;
    assert!(matches!(
        result,
        Err(WorkspaceError::Extraction(ExtractionError::Io(_)))
    ));
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let (mut ws, _file) = loaded(&["Alpha", "Bravo"]).await;
    let backend = EchoBackend::default();
    ws.ask(&backend, MODEL, "What is on page 1?").await.unwrap();
    ws.switch_mode(Mode::Glossary);
    ws.generate_view(&backend, MODEL).await.unwrap();

    ws.reset();
    let snapshot = ws.session().snapshot();
    assert!(snapshot.file_name.is_none());
    assert_eq!(snapshot.page_count, 0);
    assert!(snapshot.messages.is_empty());
    assert_eq!(snapshot.mode, Mode::Qa);
    assert!(snapshot.view.is_none());
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn test_views_generated_from_document() {
    let (mut ws, _file) = loaded(&["Alpha", "Bravo"]).await;
    let backend = EchoBackend::default();

    ws.switch_mode(Mode::Practice);
    match ws.generate_view(&backend, MODEL).await.unwrap() {
        Some(DerivedView::Practice(questions)) => {
            assert_eq!(questions.len(), 2);
            assert_eq!(questions[0].answer, "Alpha");
            assert_eq!(questions[0].options.as_ref().map(Vec::len), Some(4));
            assert!(questions[1].options.is_none());
        }
        other => panic!("unexpected view {:?}", other),
    }

    ws.switch_mode(Mode::Glossary);
    match ws.generate_view(&backend, MODEL).await.unwrap() {
        Some(DerivedView::Glossary(terms)) => {
            assert_eq!(terms.len(), 2);
            assert_eq!(terms[0].page_number, Some(1));
            // Page 99 is outside a two-page document
            assert_eq!(terms[1].page_number, None);
        }
        other => panic!("unexpected view {:?}", other),
    }

    ws.switch_mode(Mode::Flashcards);
    match ws.generate_view(&backend, MODEL).await.unwrap() {
        Some(DerivedView::Flashcards(cards)) => {
            assert_eq!(cards.len(), 1);
            assert_eq!(cards[0].term, "Alpha");
        }
        other => panic!("unexpected view {:?}", other),
    }

    ws.switch_mode(Mode::MindMap);
    match ws.generate_view(&backend, MODEL).await.unwrap() {
        Some(DerivedView::MindMap(root)) => {
            assert_eq!(root.label, "Document");
            assert_eq!(root.children[0].label, "Alpha");
        }
        other => panic!("unexpected view {:?}", other),
    }

    // Views never touch the conversation
    assert_eq!(ws.session().messages().len(), 1);
}

#[tokio::test]
async fn test_practice_prompt_includes_asked_questions() {
    let (mut ws, _file) = loaded(&["Alpha", "Bravo"]).await;
    let backend = EchoBackend::default();
    ws.ask(&backend, MODEL, "What is on page 2?").await.unwrap();

    ws.switch_mode(Mode::Practice);
    ws.generate_view(&backend, MODEL).await.unwrap();
    assert!(backend.last_prompt().contains("- What is on page 2?"));

    ws.switch_mode(Mode::MindMap);
    ws.generate_view(&backend, MODEL).await.unwrap();
    assert!(!backend.last_prompt().contains("What is on page 2?"));
}

#[tokio::test]
async fn test_failed_view_sets_error_and_keeps_mode() {
    let (mut ws, _file) = loaded(&["Alpha"]).await;
    ws.switch_mode(Mode::Flashcards);

    let result = ws.generate_view(&FailingBackend, MODEL).await;
    assert!(matches!(result, Err(WorkspaceError::Query(_))));
    assert_eq!(ws.session().mode(), Mode::Flashcards);
    assert!(ws.session().view().is_none());
    assert_eq!(ws.session().error(), Some(VIEW_ERROR_MESSAGE));
    assert!(!ws.session().is_generating());
}

#[tokio::test]
async fn test_context_budget_drops_trailing_pages() {
    let (ws, _file) = loaded(&["Alpha", "Bravo", "Charlie"]).await;
    let mut ws = ws.with_context_budget("Page 1:\nAlpha".len() + 5);
    let backend = EchoBackend::default();

    ws.ask(&backend, MODEL, "What is on page 3?").await.unwrap();
    assert!(ws.session().messages().last().unwrap().source.is_none());
    let prompt = backend.last_prompt();
    assert!(prompt.contains("Page 1:\nAlpha"));
    assert!(!prompt.contains("Charlie"));
}
