//! Headless playground demo
//!
//! Builds a small scripted scene, plays it for a few seconds of
//! simulated time and logs what the scripts, tweens and proximity
//! queries are doing, then tears play mode down and prints the saved
//! scene document.

use scene_runtime::ecs::components::PhysicsComponent;
use scene_runtime::prelude::*;

const PATROLLER: &str = r#"// Patroller
fn start(ctx) {
    ctx.add_tag("npc");
    ctx.start_coroutine("patrol");
}
fn patrol(ctx, dt) {
    if this.dir == () { this.dir = 1.0; }
    ctx.x = ctx.x + this.dir * dt * 4.0;
    if ctx.x > 8.0 { this.dir = -1.0; }
    if ctx.x < -8.0 { this.dir = 1.0; }
    true
}
"#;

const SENTRY: &str = r#"// Sentry
fn start(ctx) {
    ctx.add_tag("npc");
    ctx.attach_behavior("rotator", #{ speed: 1.5 });
    ctx.subscribe("intruder");
}
fn update(ctx, dt) {
    let nearby = ctx.query_radius(ctx.x, ctx.z, 3.0);
    if nearby.len() > 0 && ctx.get_prop("alerted") == () {
        ctx.set_prop("alerted", 1);
        ctx.emit("intruder", ctx.id());
        ctx.log("intruder spotted");
    }
}
fn on_event(ctx, name, data) {
    ctx.tween("y", 3.0, 1.5, "bounce");
}
"#;

const SURVEYOR: &str = r#"// Surveyor
fn start(ctx) { ctx.start_coroutine("survey"); }
fn survey(ctx, dt) {
    if this.task == () {
        this.task = ctx.run_task("generateTerrain", #{ width: 8, depth: 8, seed: 42 });
        return this.task;
    }
    if this.task_error != () {
        ctx.log("terrain generation failed: " + this.task_error);
        return false;
    }
    ctx.set_prop("surveyed", true);
    ctx.log("terrain survey complete");
    false
}
"#;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut runtime = Runtime::new(RuntimeConfig::default());

    let patroller = runtime
        .scene_mut()
        .add_object(GameObject::new("patroller").at(-8.0, 0.0, 0.0).with_script(PATROLLER));
    let sentry = runtime
        .scene_mut()
        .add_object(GameObject::new("sentry").at(0.0, 0.0, 0.0).with_script(SENTRY));
    runtime
        .scene_mut()
        .add_object(GameObject::new("surveyor").at(5.0, 0.0, 5.0).with_script(SURVEYOR));

    // A plain physics object with no script: dropped from a height, it
    // falls and bounces through the component runtime.
    let ball = runtime
        .scene_mut()
        .add_object(GameObject::new("ball").at(2.0, 10.0, 2.0));
    runtime
        .ecs_mut()
        .add_component(ball, Box::new(PhysicsComponent::default()));

    let report = runtime.validate_script(PATROLLER);
    log::info!("patroller script valid: {}", report.valid);

    runtime.enter_play();

    let dt = 1.0 / 60.0;
    for frame in 0..600 {
        runtime.tick(dt);

        if frame % 120 == 0 {
            let near_sentry = runtime.query_radius(0.0, 0.0, 5.0);
            let npcs = runtime.objects_with_tag("npc").len();
            log::info!(
                "frame {frame}: {} objects within 5.0 of the sentry, {npcs} tagged npc",
                near_sentry.len()
            );
        }
    }

    let sentry_y = runtime.scene().get(sentry).unwrap().transform.position.y;
    let patroller_x = runtime.scene().get(patroller).unwrap().transform.position.x;
    let ball_y = runtime.scene().get(ball).unwrap().transform.position.y;
    log::info!("after 10s: sentry.y = {sentry_y:.2}, patroller.x = {patroller_x:.2}, ball.y = {ball_y:.2}");

    runtime.exit_play();

    match runtime.save_scene() {
        Ok(json) => log::info!("saved scene document:\n{json}"),
        Err(error) => log::error!("scene save failed: {error}"),
    }
}
