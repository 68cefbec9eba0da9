use std::time::Duration;

use rulehub::{
    Config, HubBuilder,
    events::{FlowDirection, RuleMsg, TraceEvent},
};

fn main() {
    let config = Config::load_from_str(include_str!("./config.toml")).unwrap();

    let hub = HubBuilder::new().config(config).build().unwrap();

    hub.launch();

    let alice = hub.tenant("alice").unwrap();

    // sub-chains must exist before a chain can reference them
    alice.save_dsl("enrich", include_bytes!("./enrich.json")).unwrap();
    alice.save_dsl("main", include_bytes!("./main.json")).unwrap();

    // enrich -> main would close a cycle and is rejected
    let cyclic = include_str!("./enrich.json").replace(r#""id": "log", "type": "log""#, r#""id": "log", "type": "flow", "configuration": {"targetId": "main"}"#);
    match alice.save_dsl("enrich", cyclic.as_bytes()) {
        Ok(()) => println!("unexpected: cyclic definition accepted"),
        Err(e) => println!("rejected: {}", e),
    }

    let (tx, rx) = flume::unbounded();
    alice.add_debug_observer("main", "console", move |e| {
        let _ = tx.send(format!("{} {} {}", e.flow.as_ref(), e.node_id, e.relation_type));
    });

    if let Some(sink) = alice.pool().options().on_debug.clone() {
        sink(TraceEvent::new("main", "filter", FlowDirection::In, RuleMsg::new("ORDER", r#"{"paid":true}"#), "", None));
        sink(TraceEvent::new("main", "filter", FlowDirection::Out, RuleMsg::new("ORDER", r#"{"paid":true}"#), "True", None));
    }
    for _ in 0..2 {
        if let Ok(line) = rx.recv_timeout(Duration::from_secs(1)) {
            println!("observer: {}", line);
        }
    }

    let page = alice.list(&rulehub::store::ListQuery::new()).unwrap();
    for def in page.rows.iter() {
        println!("chain {} disabled={} updated={:?}", def.id(), def.rule_chain.disabled, def.additional_info("updateTime"));
    }
    println!("debug records of main: {}", alice.debug_data("main", None).len());

    alice.undeploy("main").unwrap();
    println!("main running after undeploy: {}", alice.get("main").is_some());

    hub.shutdown();
}
