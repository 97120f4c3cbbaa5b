//! Closed-loop inverted pendulum: a continuous cart-pendulum plant fed by a
//! 100 Hz LQR controller, both talking over the pub/sub transport.
//!
//! Run with `RUST_LOG=info` to see bring-up and teardown.

use log::info;
use pubsim::core::components::inputs::as_numbers;
use pubsim::rpc::{LqrController, RpcModel};
use pubsim::{BehaviorError, ComponentId, ComponentSpec, DeliveryMode, FlowTable, GraphConfig, SimError, SystemBuilder};
use serde_json::json;
use std::time::Duration;

const A: [[f64; 4]; 4] = [
    [0.0, 1.0, 0.0, 0.0],
    [0.0, -0.1818, 2.6727, 0.0],
    [0.0, 0.0, 0.0, 1.0],
    [0.0, -0.4545, 31.1818, 0.0],
];
const B: [f64; 4] = [0.0, 1.8182, 0.0, 4.5455];
const K: [f64; 4] = [-1.0, -1.6567, 18.6854, 3.4594];

fn plant() -> FlowTable {
    FlowTable::new()
        .flow("states", |ctx| Ok(ctx.state.clone()))
        .state_update(|ctx| {
            let dt = ctx.parameters["dt"].as_f64().unwrap_or(0.001);
            let x = as_numbers(ctx.state)
                .filter(|x| x.len() == 4)
                .ok_or_else(|| BehaviorError::failed("plant state must hold 4 numbers"))?;
            let u = ctx.inputs.numbers("u")?.first().copied().unwrap_or(0.0);
            let next: Vec<f64> = (0..4)
                .map(|i| {
                    let dx: f64 = (0..4).map(|j| A[i][j] * x[j]).sum::<f64>() + B[i] * u;
                    x[i] + dt * dx
                })
                .collect();
            Ok(json!(next))
        })
}

fn controller() -> FlowTable {
    FlowTable::new().flow("u", |ctx| {
        let mut input = ctx.inputs.numbers("states")?;
        input.push(ctx.parameters["reference"].as_f64().unwrap_or(0.0));
        LqrController
            .model_output(ctx.parameters, &json!(ctx.time), ctx.state, &json!(input))
            .map_err(|e| BehaviorError::failed(e.to_string()))
    })
}

fn main() -> Result<(), SimError> {
    env_logger::init();

    let dt = 0.001;
    let config = GraphConfig::new()
        .with_base_port(5600)
        .with_time_step(dt)
        .with_delivery(DeliveryMode::AwaitFresh {
            timeout: Duration::from_millis(20),
        })
        .with_trace(true);

    let mut builder = SystemBuilder::new();
    builder.config(config);
    builder.add_component(
        "plant",
        ComponentSpec::continuous("pendulum")
            .input_with_default("u", json!([0.0]))
            .output("states")
            .initial_state(json!([0.0, 0.0, 0.1, 0.0]))
            .parameters(json!({ "dt": dt })),
        plant(),
    )?;
    builder.add_component(
        "controller",
        ComponentSpec::discrete("lqr", 100.0)
            .input_with_default("states", json!([0.0, 0.0, 0.0, 0.0]))
            .output("u")
            .parameters(json!({ "xform": K, "reference": 0.0 })),
        controller(),
    )?;
    builder.connect("plant", "u", "controller", "u")?;
    builder.connect("controller", "states", "plant", "states")?;
    builder.priority(["plant"]);

    let mut engine = builder.build()?.bind()?;
    let ticks = engine.run_until(3.0)?;

    let plant_id = ComponentId::new("plant");
    let angles: Vec<f64> = engine
        .trace()
        .output_series(&plant_id, "states")
        .iter()
        .filter_map(|(_, v)| as_numbers(v).and_then(|x| x.get(2).copied()))
        .collect();
    let peak = angles.iter().fold(0.0_f64, |m, a| m.max(a.abs()));
    let last = angles.last().copied().unwrap_or(f64::NAN);

    info!("Ran {} ticks, final time {:.3}", ticks, engine.time());
    println!("peak |angle| = {:.4} rad, final angle = {:.5} rad", peak, last);

    engine.shutdown();
    Ok(())
}
