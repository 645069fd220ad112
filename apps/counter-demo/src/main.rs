use fiberweave_core::{
    cleanup, Component, Element, FiberRoot, Handler, Markup, MemoryHost, PropValue, Props,
    RootOptions,
};
use fiberweave_runtime_std::StdRuntime;

fn num_prop(props: &Props) -> i64 {
    match props.get("num") {
        Some(PropValue::Int(num)) => *num,
        _ => 0,
    }
}

fn sub_child() -> Component {
    Component::new("SubChild", |hooks, props| {
        let num = num_prop(props);
        hooks.use_effect(
            move || {
                log::info!("Sub Child mount, num: {num}");
                cleanup(move || log::info!("Sub Child unmount, num: {num}"))
            },
            (),
        )?;
        Ok(Element::host("div")
            .prop("className", "child")
            .text("Sub Child")
            .into())
    })
}

fn child() -> Component {
    let sub_child = sub_child();
    Component::new("Child", move |hooks, props| {
        let num = num_prop(props);
        hooks.use_effect(
            move || {
                log::info!("Child mount, num: {num}");
                cleanup(move || log::info!("Child unmount, num: {num}"))
            },
            (),
        )?;
        Ok(Element::host("div")
            .prop("className", "child")
            .children([
                Markup::from(Element::host("div").text("Child")),
                sub_child.element().prop("num", num).into(),
                sub_child.element().prop("num", num + 1).into(),
            ])
            .into())
    })
}

fn app() -> Component {
    let child = child();
    Component::new("App", move |hooks, _| {
        let (num, set_num) = hooks.use_state(|| 0_i64)?;
        let (count, set_count) = hooks.use_state(|| 0_i64)?;

        hooks.use_effect(
            move || {
                log::info!("App mount, num: {num}");
                cleanup(move || {
                    if let Err(err) = set_count.update(|prev| prev + 1) {
                        log::warn!("count update failed: {err}");
                    }
                    log::info!("App unmount, num: {num}");
                })
            },
            num,
        )?;

        let on_click = Handler::new(move || {
            if let Err(err) = set_num.set(num + 1) {
                log::warn!("num update failed: {err}");
            }
        });
        let body: Markup = if num % 2 == 0 {
            child.element().prop("num", num).into()
        } else {
            Markup::from(num)
        };
        Ok(Element::host("div")
            .prop("className", "app")
            .prop("onClick", on_click)
            .children([
                Markup::from(Element::host("span").child(count)),
                Element::host("div").child(body).into(),
            ])
            .into())
    })
}

fn click_app(root: &FiberRoot<MemoryHost>) -> bool {
    let handler = {
        let host = root.host();
        host.find_by_attribute(root.container(), "class", "app")
            .and_then(|node| host.handler(node, "onClick"))
    };
    match handler {
        Some(handler) => {
            handler.call();
            true
        }
        None => false,
    }
}

fn main() {
    #[cfg(feature = "logging")]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    println!("=== fiberweave counter demo ===");
    println!("Each click bumps `num`; odd values unmount the Child subtree and");
    println!("the App effect cleanup bumps `count` from inside the commit.");
    println!();

    let runtime = StdRuntime::new();
    let mut host = MemoryHost::new();
    let container = host.create_container();
    let root = runtime.create_root(
        host,
        container,
        RootOptions::default().on_uncaught_error(|err| eprintln!("uncaught: {err}")),
    );

    if let Err(err) = root.render(app().element()) {
        eprintln!("initial render rejected: {err}");
        return;
    }
    runtime.run_until_idle();
    println!("initial: {}", root.host().inner_html(container));

    for click in 1..=4 {
        if !click_app(&root) {
            eprintln!("app node not found");
            return;
        }
        runtime.run_until_idle();
        println!("click {click}: {}", root.host().inner_html(container));
    }

    if let Err(err) = root.unmount() {
        eprintln!("unmount rejected: {err}");
        return;
    }
    runtime.run_until_idle();
    println!("unmounted: {:?}", root.host().inner_html(container));
}
