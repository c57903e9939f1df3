extern crate broadphase_bvh as broadphase;
extern crate broadphase_bvh_data;

extern crate cgmath;
extern crate env_logger;
extern crate rand;
extern crate rand_chacha;

#[macro_use]
extern crate clap;

#[macro_use]
extern crate log;

use broadphase::{Bodies, Bvh, BvhBuilder, Circle, Collider, Polygon};
use broadphase_bvh_data::Scene;
use cgmath::Point2;

use rand::prelude::*;

use std::time::Instant;

trait Command {
    fn name() -> &'static str;
    fn init() -> clap::App<'static, 'static>;
    fn exec(args: &clap::ArgMatches);
}

fn random_collider<R: Rng>(rng: &mut R, world_size: f32, size_range: &[f32]) -> Collider {
    let x = rng.gen_range(0f32, world_size);
    let y = rng.gen_range(0f32, world_size);
    if rng.gen_bool(0.5) {
        Circle::new(x, y, 0.5f32 * rng.gen_range(size_range[0], size_range[1])).into()
    } else {
        let sides = rng.gen_range(3, 8);
        let radius = 0.5f32 * rng.gen_range(size_range[0], size_range[1]);
        let points = (0..sides).map(|side| {
            let angle = std::f32::consts::PI * 2f32 * (side as f32) / (sides as f32);
            Point2::new(radius * angle.cos(), radius * angle.sin())
        });
        Polygon::new(x, y, points.collect::<Vec<_>>())
            .with_angle(rng.gen_range(0f32, std::f32::consts::PI * 2f32))
            .into()
    }
}

struct GenBodies {}
impl Command for GenBodies {
    fn name() -> &'static str { "gen_bodies" }
    fn init() -> clap::App<'static, 'static> {
        use clap::Arg;
        clap::SubCommand::with_name(Self::name())
            .about("generate a scene with circles and polygons")
            .arg(Arg::with_name("seed")
                .long("seed")
                .value_name("NUMBER")
                .help("initial state for the random number generator"))
            .arg(Arg::with_name("count")
                .short("n")
                .long("count")
                .value_name("NUMBER")
                .required(true)
                .help("number of bodies in the scene"))
            .arg(Arg::with_name("size_range")
                .short("s")
                .long("size_range")
                .value_names(&["MIN", "MAX"])
                .required(true)
                .help("size range for bodies"))
            .arg(Arg::with_name("world_size")
                .short("w")
                .long("world_size")
                .value_name("NUMBER")
                .required(true)
                .help("bodies are placed in [0, world_size) on both axes"))
            .arg(Arg::with_name("padding")
                .short("p")
                .long("padding")
                .value_name("NUMBER")
                .help("padding applied to every body"))
            .arg(Arg::with_name("out_path")
                .short("o")
                .long("out")
                .value_name("PATH")
                .required(true)
                .help("where to write output"))
    }

    fn exec(args: &clap::ArgMatches) {
        let n = value_t!(args, "count", usize)
            .expect("failed to get count");
        let size_range = values_t!(args, "size_range", f32)
            .expect("failed to get size_range");
        let world_size = value_t!(args, "world_size", f32)
            .expect("failed to get world_size");
        let padding = value_t!(args, "padding", f32).unwrap_or(0f32);

        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(
            value_t!(args, "seed", u64).unwrap_or(0));
        let scene = Scene{
            bodies: (0..n)
                .map(|_| (random_collider(&mut rng, world_size, &size_range), padding))
                .collect()
        };

        scene.save(args.value_of("out_path")
            .expect("no output path specified"))
            .expect("failed to write output");
    }
}

struct ShowBodies {}
impl Command for ShowBodies {
    fn name() -> &'static str { "show_bodies" }
    fn init() -> clap::App<'static, 'static> {
        use clap::Arg;
        clap::SubCommand::with_name(Self::name())
            .about("list the bodies of a scene")
            .arg(Arg::with_name("in_path")
                .short("i")
                .long("in")
                .value_name("PATH")
                .required(true)
                .help("path to a scene generated with gen_bodies"))
    }
    fn exec(args: &clap::ArgMatches) {
        let scene = Scene::load(args.value_of("in_path")
            .expect("no input path specified"))
            .expect("failed to read input");

        println!("bodies:");
        for (id, (shape, padding)) in scene.bodies.iter().enumerate() {
            let position = shape.position();
            let kind = match shape {
                Collider::Circle(_) => "circle",
                Collider::Polygon(_) => "polygon"
            };
            println!("\tid: {:5}, {:7} at <{:8.3}, {:8.3}>, padding: {:6.3}",
                id,
                kind,
                position.x,
                position.y,
                padding);
        }
    }
}

struct StepBodies {}
impl Command for StepBodies {
    fn name() -> &'static str { "step_bodies" }
    fn init() -> clap::App<'static, 'static> {
        use clap::Arg;
        clap::SubCommand::with_name(Self::name())
            .about("move the bodies of a scene around, reporting broadphase statistics per frame")
            .arg(Arg::with_name("in_path")
                .short("i")
                .long("in")
                .value_name("PATH")
                .required(true)
                .help("path to a scene generated with gen_bodies"))
            .arg(Arg::with_name("seed")
                .long("seed")
                .value_name("NUMBER")
                .help("initial state for the random number generator"))
            .arg(Arg::with_name("frames")
                .short("f")
                .long("frames")
                .value_name("NUMBER")
                .help("number of frames to simulate"))
            .arg(Arg::with_name("speed")
                .long("speed")
                .value_name("NUMBER")
                .help("maximum distance a body moves per frame"))
    }
    fn exec(args: &clap::ArgMatches) {
        let scene = Scene::load(args.value_of("in_path")
            .expect("no input path specified"))
            .expect("failed to read input");
        let frames = value_t!(args, "frames", u32).unwrap_or(60);
        let speed = value_t!(args, "speed", f32).unwrap_or(0.1f32);
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(
            value_t!(args, "seed", u64).unwrap_or(0));

        let mut bodies = scene.to_bodies();
        let ids: Vec<_> = bodies.iter().map(|(id, _)| id).collect();

        let start = Instant::now();
        let mut bvh = BvhBuilder::new()
            .with_member_capacity(ids.len())
            .with_branch_capacity(ids.len())
            .build();
        for &id in &ids {
            bvh.insert(&mut bodies, id).expect("scene bodies must be insertable");
        }
        info!("inserted {} bodies in {:?} (depth {})", ids.len(), start.elapsed(), bvh.depth());

        let velocities: Vec<_> = ids.iter()
            .map(|_| cgmath::Vector2::new(
                rng.gen_range(-speed, speed),
                rng.gen_range(-speed, speed)))
            .collect();

        println!("frame, relocated, pairs, depth, update_us, pairs_us");
        for frame in 0..frames {
            for (&id, velocity) in ids.iter().zip(velocities.iter()) {
                let shape = &mut bodies[id].shape;
                let position = shape.position();
                shape.set_position(position + *velocity);
            }

            let start = Instant::now();
            let relocated = bvh.update(&mut bodies);
            let update_time = start.elapsed();

            let start = Instant::now();
            let pairs = pair_count(&bvh, &bodies);
            let pairs_time = start.elapsed();

            println!("{}, {}, {}, {}, {}, {}",
                frame,
                relocated,
                pairs,
                bvh.depth(),
                update_time.as_micros(),
                pairs_time.as_micros());
        }

        if !bvh.validate(&bodies) {
            error!("hierarchy failed validation after {} frames", frames);
        }
    }
}

fn pair_count(bvh: &Bvh, bodies: &Bodies<Collider>) -> usize {
    bvh.par_potential_pairs(bodies, |_, _| true).len()
}

macro_rules! app_cmds {
    (app $app: expr; $(cmd $cmd: ident)*) => {
        {
            let mut app = $app as clap::App;
            $(
                app = app.subcommand(<$cmd as Command>::init());
            )*
            let matches = app.get_matches();
            $(
                if let Some(matches) = matches.subcommand_matches(<$cmd as Command>::name()) {
                    <$cmd as Command>::exec(matches);
                }
            )*
        }
    };
}

fn main() {
    env_logger::init();
    app_cmds!{
        app clap::App::new("gen_test_data")
            .version("0.1.0");
        cmd GenBodies
        cmd ShowBodies
        cmd StepBodies
    };
}
