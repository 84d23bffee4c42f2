use notesync_content::{Template, TemplateContext, TemplateIssue, render_str};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn context() -> TemplateContext {
    TemplateContext::new()
        .with("number", "42")
        .with("title", "Fix the parser")
        .with("closed", "")
        .with("milestone", "v1.0")
        .with("labels", "bug, parser")
}

#[rstest]
#[case("Issue - {number}", "Issue - 42")]
#[case("{title} ({number})", "Fix the parser (42)")]
#[case("{missing}", "")]
#[case("{closed:Closed on {closed}}", "")]
#[case("{milestone:Milestone {milestone}}", "Milestone v1.0")]
#[case("{labels:Labels: {labels}. }end", "Labels: bug, parser. end")]
#[case("{missing:never}", "")]
#[case("no variables", "no variables")]
fn test_render(#[case] template: &str, #[case] expected: &str) {
    assert_eq!(render_str(template, &context()), expected);
}

#[test]
fn test_conditional_renders_when_value_present() {
    let template = Template::parse("{closed:Closed on {closed}}");
    let context = TemplateContext::new().with("closed", "2024-01-15");
    assert_eq!(template.render(&context), "Closed on 2024-01-15");
}

#[test]
fn test_unclosed_conditional_is_literal() {
    let template = Template::parse("# {title}\n{closed:Closed on {closed}\nrest");
    let rendered = template.render(&context().with("closed", "today"));

    assert_eq!(rendered, "# Fix the parser\n{closed:Closed on {closed}\nrest");
    assert_eq!(
        template.issues(),
        &[TemplateIssue::UnclosedConditional {
            name: "closed".to_string(),
            offset: 10
        }]
    );
}

#[test]
fn test_nested_conditional_is_literal() {
    let template = Template::parse("{a:x {b:y} z}");
    let rendered = template.render(&TemplateContext::new().with("a", "1").with("b", "1"));

    assert_eq!(rendered, "x {b:y} z");
    assert!(matches!(
        template.issues(),
        [TemplateIssue::NestedConditional { name, .. }] if name == "b"
    ));
}

#[test]
fn test_values_are_not_reinterpreted() {
    let context = TemplateContext::new().with("body", "{title} {x:y}");
    assert_eq!(render_str("{body}", &context.with("title", "T")), "{title} {x:y}");
}

#[rstest]
#[case("Issue - {number}", "Issue - 42", Some("42"))]
#[case("{number} - {title}", "17 - Fix - bug", Some("17"))]
#[case("PR-{number}{title:-{title}}", "PR-9-Docs", Some("9"))]
#[case("PR-{number}{title:-{title}}", "PR-9", Some("9"))]
#[case("Issue - {number}", "Notes", None)]
#[case("{title}", "Anything", None)]
fn test_extract_variable(
    #[case] template: &str,
    #[case] rendered: &str,
    #[case] expected: Option<&str>,
) {
    let template = Template::parse(template);
    assert_eq!(
        template.extract_variable(rendered, "number").as_deref(),
        expected
    );
}

#[test]
fn test_extract_inverts_render() {
    let template = Template::parse("{repoName} #{number} {title}");
    let context = TemplateContext::new()
        .with("repoName", "tracker")
        .with("number", "1234")
        .with("title", "Add feature");
    let rendered = template.render(&context);

    assert_eq!(
        template.extract_variable(&rendered, "number"),
        Some("1234".to_string())
    );
}
