use std::sync::Arc;
use std::time::Duration;

use amp_vars::{
    Allowlist, AssertionMode, Bindings, Config, ConsentState, DocumentServices, ElementContext,
    Error, ExpansionOptions, InMemory, MacroOutput, MacroResult, ParamNum, Services, SessionKey,
    UrlReplacements, VariableService,
};
use async_trait::async_trait;
use rstest::{fixture, rstest};

#[fixture]
fn backend() -> Arc<InMemory> {
    Arc::new(
        InMemory::default()
            .with_cookie("_ga", "GA1.2.345")
            .with_consent_state(ConsentState::Sufficient)
            .with_session_value("googleanalytics", SessionKey::Id, "5678")
            .with_session_value("googleanalytics", SessionKey::Count, 3.0)
            .with_linker_param("_linker", "cid", "amp-abc")
            .with_experiment("exp1", "123")
            .with_experiment("exp2", "456")
            .with_meta("title", "Hello AMP")
            .with_scroll(120.6, 0.0),
    )
}

#[fixture]
fn service(backend: Arc<InMemory>) -> VariableService {
    let mut service =
        VariableService::with_defaults(Config::default(), Services::from_backend(backend));
    service
        .register_fn("CLIENT_ID", ParamNum::Range(0, 1), |args| {
            let scope = args.first().map(String::as_str).unwrap_or("amp");
            Ok(format!("{}-12345", scope).into())
        })
        .unwrap();
    service
        .register_fn("DELAYED", ParamNum::Range(1, 2), |args| {
            let value = args[0].clone();
            let millis = args.get(1).and_then(|ms| ms.parse().ok()).unwrap_or(10);
            Ok(MacroResult::Async(Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok::<_, Error>(MacroOutput::from(value))
            })))
        })
        .unwrap();
    service
}

#[fixture]
fn element(backend: Arc<InMemory>) -> Arc<ElementContext> {
    Arc::new(ElementContext::new(
        "googleanalytics",
        DocumentServices::from_backend(backend),
    ))
}

#[rstest]
#[case::client_id(
    "https://example.com/collect?cid=${clientId(_ga)}",
    vec![("clientId", "CLIENT_ID")],
    "https://example.com/collect?cid=_ga-12345"
)]
#[case::cookie("c=${cookie(_ga)}", vec![("cookie", "COOKIE")], "c=GA1.2.345")]
#[case::consent("s=${consentState}", vec![("consentState", "CONSENT_STATE")], "s=sufficient")]
#[case::session(
    "sid=${sid}&sct=${sct}",
    vec![("sid", "SESSION_ID"), ("sct", "SESSION_COUNT")],
    "sid=5678&sct=3"
)]
#[case::linker("l=${l}", vec![("l", "LINKER_PARAM(_linker, cid)")], "l=amp-abc")]
#[case::experiments(
    "e=${all}&one=${one}",
    vec![("all", "EXPERIMENT_BRANCHES"), ("one", "EXPERIMENT_BRANCHES(exp2)")],
    "e=exp1%3A123%2Cexp2%3A456&one=456"
)]
#[case::meta("t=${title}", vec![("title", "AMPDOC_META(title)")], "t=Hello%20AMP")]
#[case::meta_default("d=${desc}", vec![("desc", "AMPDOC_META(description, none)")], "d=none")]
#[case::scroll("y=${y}", vec![("y", "SCROLL_TOP")], "y=121")]
#[case::chained(
    "x=${x}",
    vec![("x", "$TOUPPERCASE($SUBSTR(COOKIE(_ga), 0, 3))")],
    "x=GA1"
)]
#[case::conditional(
    "v=${v}",
    vec![("v", "$IF($EQUALS(COOKIE(_ga), GA1.2.345), yes, no)")],
    "v=yes"
)]
#[case::async_macro("d=${d}&e=${e}", vec![("d", "DELAYED(a)"), ("e", "DELAYED(b)")], "d=a&e=b")]
#[case::async_out_of_order(
    "${a}|${b}|${c}",
    vec![("a", "DELAYED(first, 60)"), ("b", "DELAYED(second, 30)"), ("c", "DELAYED(third, 0)")],
    "first|second|third"
)]
#[case::async_args_out_of_order(
    "${v}",
    vec![("v", "$CALC(DELAYED(10, 50), DELAYED(4, 0), subtract)")],
    "6"
)]
#[case::macro_name_in_text(
    "t=${title}&ok=${ok}",
    vec![("title", "Accept COOKIE policy"), ("ok", "1")],
    "t=Accept%20%20policy&ok=1"
)]
#[case::if_with_extra_arg("v=${v}", vec![("v", "$IF(1, a, b, c)")], "v=a")]
#[case::scroll_with_arg("y=${y}", vec![("y", "SCROLL_TOP(x)")], "y=121")]
#[case::nested_vars(
    "p=${page}",
    vec![("page", "${section}/${id}"), ("section", "news"), ("id", "CLIENT_ID")],
    "p=news%2Famp-12345"
)]
#[case::unknown_name("u=${unknown}", vec![], "u=")]
#[tokio::test]
async fn test_expand_template(
    service: VariableService,
    element: Arc<ElementContext>,
    #[case] template: &str,
    #[case] vars: Vec<(&str, &str)>,
    #[case] expected: &str,
) {
    let options = vars
        .into_iter()
        .fold(ExpansionOptions::default(), |options, (name, value)| {
            options.with_var(name, value)
        });

    let result = service
        .expand_template(template, &options, &element, None, None)
        .await;
    assert_eq!(result, Ok(expected.to_string()));
}

#[rstest]
#[tokio::test]
async fn test_config_iterations(backend: Arc<InMemory>, element: Arc<ElementContext>) {
    let config = Config {
        iterations: 0,
        ..Config::default()
    };
    let service = VariableService::with_defaults(config.clone(), Services::from_backend(backend));
    let options = config
        .expansion_options(Default::default())
        .with_var("a", "${b}")
        .with_var("b", "leaf");

    let result = service
        .expand_template("${a}", &options, &element, None, None)
        .await;
    assert_eq!(result, Ok("%24%7Bb%7D".to_string()));
}

#[rstest]
#[tokio::test]
async fn test_hash_macro(service: VariableService, element: Arc<ElementContext>) {
    let options = ExpansionOptions::default().with_var("h", "$HASH(COOKIE(_ga))");
    let hash = service
        .expand_template("${h}", &options, &element, None, None)
        .await
        .unwrap();

    assert_eq!(hash.len(), 64);
    assert!(!hash.contains('='));

    let direct = ExpansionOptions::default().with_var("h", "$HASH(GA1.2.345)");
    assert_eq!(
        service
            .expand_template("${h}", &direct, &element, None, None)
            .await,
        Ok(hash)
    );
}

#[rstest]
fn test_duplicate_registration(mut service: VariableService) {
    let result = service.register_fn("$TRIM", ParamNum::Any, |_| Ok("x".into()));
    assert_eq!(result, Err(Error::DuplicateMacro("$TRIM".to_string())));
}

#[rstest]
#[tokio::test]
async fn test_production_mode_degrades(backend: Arc<InMemory>, element: Arc<ElementContext>) {
    let config = Config {
        mode: AssertionMode::Production,
        ..Config::default()
    };
    let service = VariableService::with_defaults(config, Services::from_backend(backend));
    let options = ExpansionOptions::default()
        .with_var("ok", "COOKIE(_ga)")
        .with_var("nan", "$SUBSTR(abc, x)")
        .with_var("arity", "$SUBSTR(abc)");

    let result = service
        .expand_template("${ok}|${nan}|${arity}", &options, &element, None, None)
        .await;
    assert_eq!(result, Ok("GA1.2.345||".to_string()));
}

/// Resolves nothing; records what it was given.
struct Passthrough;

#[async_trait]
impl UrlReplacements for Passthrough {
    async fn expand_string_async(
        &self,
        value: &str,
        bindings: &Bindings,
        allowlist: Option<&Allowlist>,
    ) -> amp_vars::Result<String> {
        Ok(format!(
            "{}[{}:{}]",
            value,
            bindings.contains_key("COOKIE"),
            allowlist.map_or(0, |allowed| allowed.len())
        ))
    }
}

#[rstest]
#[tokio::test]
async fn test_custom_url_replacements(element: Arc<ElementContext>) {
    let service = VariableService::new(Config::default(), Arc::new(Passthrough));
    let allowlist: Allowlist = ["COOKIE".to_string()].into_iter().collect();
    let mut options = ExpansionOptions::default().with_var("c", "COOKIE");
    options.no_encode = true;

    let result = service
        .expand_template("${c(_ga)}", &options, &element, None, Some(&allowlist))
        .await;
    assert_eq!(result, Ok("COOKIE(_ga)[true:1]".to_string()));
}
