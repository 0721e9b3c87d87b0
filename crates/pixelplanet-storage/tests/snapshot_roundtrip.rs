use pixelplanet_core::{PixelPlanetConfig, Population};
use pixelplanet_storage::{MetricsRecorder, load_population, load_world, save_population, save_world};
use pixelplanet_world::World;

fn bits(values: &[f32]) -> Vec<u32> {
    values.iter().map(|v| v.to_bits()).collect()
}

#[test]
fn world_snapshot_round_trips_bit_exact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("snapshots").join("world.pxw");

    let mut world = World::generate(0xC0FFEE, 48, 24).expect("world");
    // Mutate slow state so the reload contract is visible: layers restart
    // zeroed, the biome grid is carried verbatim.
    world.deposit_biomass(4, 4, 3.0, 1.0);
    save_world(&world, &path).expect("save");

    let loaded = load_world(&path).expect("load");
    assert_eq!(loaded.width(), world.width());
    assert_eq!(loaded.height(), world.height());
    assert_eq!(loaded.biomes(), world.biomes());
    assert_eq!(
        bits(loaded.fields().elevation()),
        bits(world.fields().elevation())
    );
    assert_eq!(
        bits(loaded.fields().temperature()),
        bits(world.fields().temperature())
    );
    assert_eq!(
        bits(loaded.fields().humidity()),
        bits(world.fields().humidity())
    );
    assert_eq!(
        bits(loaded.fields().pressure()),
        bits(world.fields().pressure())
    );
    assert!(loaded.organic_layer().iter().all(|v| *v == 0.0));
    assert!(loaded.mineral_layer().iter().all(|v| *v == 0.0));
    assert_eq!(loaded.dirty_len(), 0);
}

#[test]
fn population_snapshot_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("population.pxp");

    let config = PixelPlanetConfig {
        world_width: 48,
        world_height: 24,
        rng_seed: Some(5),
        capacity: 64,
        initial_pixels: 20,
        ..PixelPlanetConfig::default()
    };
    let world = World::generate(5, 48, 24).expect("world");
    let mut population = Population::new(config.clone()).expect("population");
    population.spawn_random(&world, 20);
    population.columns_mut().energies_mut()[3] = 0.25;

    save_population(&population, &path).expect("save");

    let mut restored = Population::new(config).expect("population");
    let count = load_population(&mut restored, &path).expect("load");
    assert_eq!(count, 20);
    assert_eq!(restored.count(), 20);
    for i in 0..20 {
        let a = population.columns().positions()[i];
        let b = restored.columns().positions()[i];
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
        assert_eq!(
            population.columns().energies()[i].to_bits(),
            restored.columns().energies()[i].to_bits()
        );
        assert_eq!(
            population.columns().species()[i],
            restored.columns().species()[i]
        );
    }
}

#[test]
fn population_load_truncates_to_capacity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("population.pxp");

    let big = PixelPlanetConfig {
        world_width: 48,
        world_height: 24,
        rng_seed: Some(9),
        capacity: 64,
        initial_pixels: 40,
        ..PixelPlanetConfig::default()
    };
    let world = World::generate(9, 48, 24).expect("world");
    let mut population = Population::new(big).expect("population");
    population.spawn_random(&world, 40);
    save_population(&population, &path).expect("save");

    let small = PixelPlanetConfig {
        world_width: 48,
        world_height: 24,
        rng_seed: Some(9),
        capacity: 16,
        initial_pixels: 16,
        ..PixelPlanetConfig::default()
    };
    let mut restored = Population::new(small).expect("population");
    let count = load_population(&mut restored, &path).expect("load");
    assert_eq!(count, 16);
    assert_eq!(restored.count(), 16);
}

#[test]
fn metrics_recorder_writes_commented_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut recorder = MetricsRecorder::new(dir.path().join("metrics"), "smoke", 42);

    assert!(recorder.save().expect("empty save").is_none());

    recorder.record(pixelplanet_core::MetricsRow {
        tick: 12,
        time: 12.0,
        year: 2,
        population: 30,
        avg_energy: 0.8,
        var_energy: 0.01,
        trait_diversity: 3,
        avg_traits_per_agent: 0.5,
        mean_info_order: 0.1,
        global_o2: 0.02,
        global_co2: 0.0004,
    });
    assert_eq!(recorder.rows().len(), 1);
    let path = recorder.save().expect("save").expect("path");
    let contents = std::fs::read_to_string(&path).expect("read");

    assert!(contents.starts_with("# run_id="));
    assert!(contents.contains("# seed=42"));
    assert!(contents.contains("# label=smoke"));
    assert!(contents.contains("tick,time,year,population,avg_energy"));
    assert!(contents.lines().filter(|l| !l.starts_with('#')).count() == 2);
    assert!(contents.contains(",30,"));
}
