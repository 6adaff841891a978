use serde_json::json;
use stache::{Context, Error, RenderConfig, Tags, Value, Writer};
use std::collections::HashMap;
use std::sync::Arc;

fn render(template: &str, view: serde_json::Value) -> String {
    stache::render(template, &Value::from(view), None, None).unwrap()
}

fn render_with_partials(
    template: &str,
    view: serde_json::Value,
    partials: &[(&str, &str)],
) -> String {
    let partials: HashMap<String, String> = partials
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    stache::render(template, &Value::from(view), Some(&partials), None).unwrap()
}

#[test]
fn test_tag_free_template_is_identity() {
    let template = "<p>plain text</p>\n  with lines \n";
    assert_eq!(render(template, json!({})), template);
}

#[test]
fn test_numbers_verbatim_strings_escaped() {
    assert_eq!(render("{{n}}", json!({"n": 42})), "42");
    assert_eq!(render("{{n}}", json!({"n": 1.5})), "1.5");
    assert_eq!(render("{{s}}", json!({"s": "a & <b>"})), "a &amp; &lt;b&gt;");
    assert_eq!(render("{{{s}}}", json!({"s": "a & <b>"})), "a & <b>");
    assert_eq!(render("{{& s}}", json!({"s": "a & <b>"})), "a & <b>");
}

#[test]
fn test_missing_and_null_render_nothing() {
    assert_eq!(render("[{{missing}}][{{n}}]", json!({"n": null})), "[][]");
}

#[test]
fn test_section_truthiness() {
    let t = "{{#a}}X{{/a}}";
    assert_eq!(render(t, json!({"a": false})), "");
    assert_eq!(render(t, json!({"a": []})), "");
    assert_eq!(render(t, json!({"a": [1, 2]})), "XX");
    assert_eq!(render(t, json!({"a": {}})), "X");
    assert_eq!(render(t, json!({"a": 0})), "");
    assert_eq!(render(t, json!({"a": ""})), "");
    assert_eq!(render(t, json!({"a": true})), "X");
}

#[test]
fn test_section_iterates_with_element_scope() {
    let view = json!({"items": [{"name": "a"}, {"name": "b"}], "sep": ","});
    assert_eq!(render("{{#items}}{{name}}{{sep}}{{/items}}", view), "a,b,");
    assert_eq!(render("{{#list}}<{{.}}>{{/list}}", json!({"list": [1, "x"]})), "<1><x>");
}

#[test]
fn test_inverted_section() {
    let t = "{{^a}}Y{{/a}}";
    assert_eq!(render(t, json!({"a": []})), "Y");
    assert_eq!(render(t, json!({"a": [1]})), "");
    assert_eq!(render(t, json!({})), "Y");
    assert_eq!(render(t, json!({"a": "x"})), "");
}

#[test]
fn test_dotted_names() {
    assert_eq!(render("{{a.b.c}}", json!({"a": {"b": {"c": "Tom"}}})), "Tom");
    assert_eq!(render("{{a.b.c}}", json!({"a": {}})), "");
    assert_eq!(render("{{list.length}}", json!({"list": [1, 2, 3]})), "3");
}

#[test]
fn test_scope_fallback() {
    let view = json!({"a": {}, "b": "outer"});
    assert_eq!(render("{{#a}}{{b}}{{/a}}", view), "outer");
}

#[test]
fn test_standalone_lines_are_stripped() {
    let view = json!({"a": {"b": "Tom"}});
    assert_eq!(render("  {{#a}}  \n{{b}}\n{{/a}}", view), "Tom\n");

    let view = json!({"items": [1, 2]});
    let template = "<ul>\n  {{#items}}\n  <li>{{.}}</li>\n  {{/items}}\n</ul>";
    assert_eq!(render(template, view), "<ul>\n  <li>1</li>\n  <li>2</li>\n</ul>");
}

#[test]
fn test_comments_produce_no_output() {
    assert_eq!(render("a{{! note }}b", json!({})), "ab");
    assert_eq!(render("x\n  {{! standalone }}\ny", json!({})), "x\ny");
    assert!(stache::parse("{{! only }}", None).unwrap().is_empty());
}

#[test]
fn test_syntax_errors() {
    let err = stache::parse("{{name", None).unwrap_err();
    assert!(err.is_syntax());

    let err = stache::parse("{{#a}}x", None).unwrap_err();
    assert!(err.is_syntax());

    let err = stache::parse("{{#a}}x{{/b}}", None).unwrap_err();
    assert!(err.is_syntax());
    assert_eq!(err.pos(), Some(7));

    let err = stache::parse("x{{/a}}", None).unwrap_err();
    assert!(err.is_syntax());
}

#[test]
fn test_partial_indentation() {
    let out = render_with_partials(" {{>p}}", json!({}), &[("p", "I\nLove\nU")]);
    assert_eq!(out, " I\n Love\n U");
}

#[test]
fn test_inline_partial_keeps_first_line() {
    let out = render_with_partials("x {{>p}}", json!({}), &[("p", "a\nb")]);
    assert_eq!(out, "x a\n  b");
}

#[test]
fn test_partial_uses_current_scope() {
    let view = json!({"people": [{"name": "a"}, {"name": "b"}]});
    let out = render_with_partials(
        "{{#people}}{{>row}}{{/people}}",
        view,
        &[("row", "<{{name}}>")],
    );
    assert_eq!(out, "<a><b>");
}

#[test]
fn test_missing_partial_renders_nothing() {
    assert_eq!(render_with_partials("[{{>nope}}]", json!({}), &[]), "[]");
    assert_eq!(render("[{{>nope}}]", json!({})), "[]");
}

#[test]
fn test_closure_partials() {
    let resolver = |name: &str| (name == "greet").then(|| "hi {{name}}".to_string());
    let view = Value::from(json!({"name": "Tom"}));
    let out = stache::render("{{>greet}}!", &view, Some(&resolver), None).unwrap();
    assert_eq!(out, "hi Tom!");
}

#[test]
fn test_set_delimiters() {
    assert_eq!(render("{{=<% %>=}}<%name%>", json!({"name": "Tom"})), "Tom");
    assert_eq!(render("{{=<% %>=}}<%={{ }}=%>{{name}}", json!({"name": "Tom"})), "Tom");

    let err = stache::parse("{{=<%=}}", None).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_custom_tags_in_config() {
    let config = RenderConfig::from(Tags::new("<%", "%>").unwrap());
    let view = Value::from(json!({"name": "Tom"}));
    let out = stache::render("{{name}} <%name%>", &view, None, Some(&config)).unwrap();
    assert_eq!(out, "{{name}} Tom");
}

#[test]
fn test_custom_escape() {
    let config = RenderConfig::default().with_escape(|s| s.to_uppercase());
    let view = Value::from(json!({"name": "tom", "n": 7}));
    let out = stache::render("{{name}}{{n}}{{{name}}}", &view, None, Some(&config)).unwrap();
    assert_eq!(out, "TOM7tom");

    let view = Value::from(json!({"s": "<b>"}));
    let out = stache::render("{{s}}", &view, None, Some(&RenderConfig::raw())).unwrap();
    assert_eq!(out, "<b>");
}

#[test]
fn test_section_lambda_receives_raw_body() {
    let view: Value = [
        ("name", Value::from("Tom")),
        (
            "bold",
            Value::section(|text, render| Ok(Some(format!("<b>{}</b>", render(text)?)))),
        ),
        (
            "raw",
            Value::section(|text, _render| Ok(Some(text.to_string()))),
        ),
        ("skip", Value::section(|_text, _render| Ok(None))),
    ]
    .into_iter()
    .collect();

    let out = stache::render("{{#bold}}Hi {{name}}{{/bold}}", &view, None, None).unwrap();
    assert_eq!(out, "<b>Hi Tom</b>");

    let out = stache::render("{{#raw}}Hi {{name}}{{/raw}}", &view, None, None).unwrap();
    assert_eq!(out, "Hi {{name}}");

    let out = stache::render("[{{#skip}}x{{/skip}}]", &view, None, None).unwrap();
    assert_eq!(out, "[]");
}

#[test]
fn test_section_lambda_without_original_is_unsupported() {
    let view: Value = [("wrap", Value::section(|text, _| Ok(Some(text.to_string()))))]
        .into_iter()
        .collect();
    let writer = Writer::new();
    let tokens = writer.parse("{{#wrap}}x{{/wrap}}", None).unwrap();
    let context = Context::new(&view);

    let err = writer
        .render_tokens(&tokens, &context, None, None, None)
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));

    let out = writer
        .render_tokens(&tokens, &context, None, Some("{{#wrap}}x{{/wrap}}"), None)
        .unwrap();
    assert_eq!(out, "x");
}

#[test]
fn test_getter_lambda() {
    let view: Value = [
        ("first", Value::from("Tom")),
        (
            "greeting",
            Value::getter(|this| {
                Value::String(format!("Hello {}", this.child("first").cloned().unwrap_or_default()))
            }),
        ),
    ]
    .into_iter()
    .collect();
    let out = stache::render("{{greeting}}", &view, None, None).unwrap();
    assert_eq!(out, "Hello Tom");
}

#[test]
fn test_render_value_rejects_non_string() {
    let view = Value::from(json!({}));

    let err = stache::render_value(&Value::from(json!([1])), &view, None, None).unwrap_err();
    assert!(matches!(&err, Error::InvalidArgument(msg) if msg.contains("\"array\"")));

    let err = stache::render_value(&Value::from(json!({})), &view, None, None).unwrap_err();
    assert!(matches!(&err, Error::InvalidArgument(msg) if msg.contains("\"object\"")));

    let out = stache::render_value(&Value::from("ok"), &view, None, None).unwrap();
    assert_eq!(out, "ok");
}

#[test]
fn test_recursion_limit() {
    let partials: HashMap<String, String> =
        [("loop".to_string(), "x{{>loop}}".to_string())].into_iter().collect();
    let config = RenderConfig::default().with_max_depth(5);
    let view = Value::from(json!({}));

    let err = stache::render("{{>loop}}", &view, Some(&partials), Some(&config)).unwrap_err();
    assert!(matches!(err, Error::RecursionLimit(5)));
}

#[test]
fn test_writer_cache_identity() {
    let writer = Writer::new();
    let first = writer.parse("Hi {{name}}", None).unwrap();
    let second = writer.parse("Hi {{name}}", None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // 不同分隔符分别缓存
    let custom = writer
        .parse("Hi {{name}}", Some(&Tags::new("<%", "%>").unwrap()))
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &custom));

    writer.clear_cache();
    let third = writer.parse("Hi {{name}}", None).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(first, third);
}

#[test]
fn test_facade_parse_after_clear_cache() {
    let before = stache::parse("{{#a}}{{b}}{{/a}}", None).unwrap();
    stache::clear_cache();
    let after = stache::parse("{{#a}}{{b}}{{/a}}", None).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_uncached_writer() {
    let writer = Writer::new().without_cache();
    let first = writer.parse("{{a}}", None).unwrap();
    let second = writer.parse("{{a}}", None).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first, second);
}

#[test]
fn test_render_in_shares_context() {
    let root = Value::from(json!({"site": "blog"}));
    let context = Context::new(&root);
    let page = context.push(Value::from(json!({"title": "Home"})));

    let writer = Writer::new();
    let out = writer
        .render_in("{{title}} - {{site}}", &page, None, None)
        .unwrap();
    assert_eq!(out, "Home - blog");
}
