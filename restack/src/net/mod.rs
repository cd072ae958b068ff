use std::{
    fs::{
        self,
        File,
    },
    io::{
        BufReader,
        BufWriter,
    },
    path::{
        Path,
        PathBuf,
    },
    time::SystemTime,
};

use byteorder::{
    LittleEndian,
    ReadBytesExt,
    WriteBytesExt,
};
use log::info;

use crate::{
    error::{
        Error,
        Result,
    },
    poker::card::{
        Card,
        HOLE_PAIRS,
    },
    state::manager::Stage,
};

/// One dense layer, weights row-major `[out][in]`.
struct Dense {
    in_dim: usize,
    out_dim: usize,
    weights: Vec<f64>,
    biases: Vec<f64>,
}

impl Dense {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        debug_assert_eq!(self.in_dim, input.len());
        let mut out = Vec::with_capacity(self.out_dim);
        for o in 0..self.out_dim {
            let row = &self.weights[o * self.in_dim..(o + 1) * self.in_dim];
            let mut acc = self.biases[o];
            for (w, x) in row.iter().zip(input.iter()) {
                acc += w * x;
            }
            out.push(acc);
        }
        out
    }
}

/// A per-stage counterfactual value predictor.
///
/// Input layout is `[r1 | r2 | public card ids | pot]`; the head emits
/// `[v1 | v2]`. With no checkpoint loaded the network is the zero function,
/// which keeps a resolve converging, just less sharply.
pub struct ValueNetwork {
    public_size: usize,
    layers: Vec<Dense>,
}

impl ValueNetwork {
    pub fn zero(public_size: usize) -> ValueNetwork {
        ValueNetwork {
            public_size,
            layers: vec![],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn input_size(&self) -> usize {
        HOLE_PAIRS * 2 + self.public_size + 1
    }

    pub fn predict(
        &self,
        r1: &[f64],
        r2: &[f64],
        public_cards: &[Card],
        pot: i32,
    ) -> (Vec<f64>, Vec<f64>) {
        debug_assert_eq!(HOLE_PAIRS, r1.len());
        debug_assert_eq!(HOLE_PAIRS, r2.len());
        if self.layers.is_empty() {
            return (vec![0.0; HOLE_PAIRS], vec![0.0; HOLE_PAIRS]);
        }
        debug_assert_eq!(self.public_size, public_cards.len());

        let mut x = Vec::with_capacity(self.input_size());
        x.extend_from_slice(r1);
        x.extend_from_slice(r2);
        x.extend(public_cards.iter().map(|c| c.id() as f64));
        x.push(pot as f64);

        let last = self.layers.len() - 1;
        for layer in &self.layers[..last] {
            x = layer.forward(&x);
            for v in &mut x {
                *v = v.max(0.0);
            }
        }
        let out = self.layers[last].forward(&x);

        let v1 = out[..HOLE_PAIRS].to_vec();
        let v2 = out[HOLE_PAIRS..].to_vec();
        (v1, v2)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut w = BufWriter::new(File::create(path)?);
        w.write_u32::<LittleEndian>(self.public_size as u32)?;
        w.write_u32::<LittleEndian>(self.layers.len() as u32)?;
        for layer in &self.layers {
            w.write_u32::<LittleEndian>(layer.in_dim as u32)?;
            w.write_u32::<LittleEndian>(layer.out_dim as u32)?;
            for v in &layer.weights {
                w.write_f64::<LittleEndian>(*v)?;
            }
            for v in &layer.biases {
                w.write_f64::<LittleEndian>(*v)?;
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<ValueNetwork> {
        let malformed = |reason: String| Error::MalformedBlob {
            path: path.display().to_string(),
            reason,
        };

        let mut r = BufReader::new(File::open(path)?);
        let public_size = r.read_u32::<LittleEndian>()? as usize;
        if ![0, 3, 4, 5].contains(&public_size) {
            return Err(malformed(format!("bad public card count {}", public_size)));
        }
        let layer_count = r.read_u32::<LittleEndian>()? as usize;
        if layer_count == 0 || layer_count > 64 {
            return Err(malformed(format!("bad layer count {}", layer_count)));
        }

        let mut layers = Vec::with_capacity(layer_count);
        let mut expected_in = HOLE_PAIRS * 2 + public_size + 1;
        for l in 0..layer_count {
            let in_dim = r.read_u32::<LittleEndian>()? as usize;
            let out_dim = r.read_u32::<LittleEndian>()? as usize;
            if in_dim != expected_in {
                return Err(malformed(format!(
                    "layer {} expects {} inputs, found {}",
                    l, expected_in, in_dim
                )));
            }
            let mut weights = vec![0.0; in_dim * out_dim];
            r.read_f64_into::<LittleEndian>(&mut weights)?;
            let mut biases = vec![0.0; out_dim];
            r.read_f64_into::<LittleEndian>(&mut biases)?;
            layers.push(Dense {
                in_dim,
                out_dim,
                weights,
                biases,
            });
            expected_in = out_dim;
        }
        if expected_in != HOLE_PAIRS * 2 {
            return Err(malformed(format!("head emits {} values, want {}", expected_in, HOLE_PAIRS * 2)));
        }

        Ok(ValueNetwork {
            public_size,
            layers,
        })
    }
}

/// Zero-sum diagnostic the training side drives to zero; exposed so tests
/// can check loaded predictors for consistency.
pub fn zero_sum_residual(r1: &[f64], r2: &[f64], v1: &[f64], v2: &[f64]) -> f64 {
    let dot = |a: &[f64], b: &[f64]| a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f64>();
    dot(r1, v1) + dot(r2, v2)
}

/// Stage-indexed predictor registry. Loaded once at startup; a stage with
/// no usable checkpoint silently degrades to the zero predictor.
pub struct NetManager {
    networks: [ValueNetwork; 4],
}

const STAGES: [Stage; 4] = [Stage::PreFlop, Stage::Flop, Stage::Turn, Stage::River];
const PUBLIC_SIZES: [usize; 4] = [0, 3, 4, 5];

impl NetManager {
    pub fn zero() -> NetManager {
        NetManager {
            networks: PUBLIC_SIZES.map(ValueNetwork::zero),
        }
    }

    /// Scans `dir/<stage>/` for the newest `.ckpt` by modification time.
    pub fn load(dir: &Path) -> NetManager {
        let networks = [0, 1, 2, 3].map(|i| {
            let stage = STAGES[i];
            let public_size = PUBLIC_SIZES[i];
            let stage_dir = dir.join(stage.tag());
            match Self::latest_checkpoint(&stage_dir).and_then(|p| ValueNetwork::load(&p).ok()) {
                Some(network) => {
                    info!("Loaded {} value network from {}", stage, stage_dir.display());
                    network
                }
                None => {
                    info!("No {} value network under {}, using zeros", stage, stage_dir.display());
                    ValueNetwork::zero(public_size)
                }
            }
        });
        NetManager {
            networks,
        }
    }

    fn latest_checkpoint(dir: &Path) -> Option<PathBuf> {
        let entries = fs::read_dir(dir).ok()?;
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("ckpt") {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, path));
            }
        }
        newest.map(|(_, path)| path)
    }

    pub fn network(&self, stage: Stage) -> &ValueNetwork {
        match stage {
            Stage::PreFlop => &self.networks[0],
            Stage::Flop => &self.networks[1],
            Stage::Turn => &self.networks[2],
            Stage::River => &self.networks[3],
            Stage::Showdown => panic!("Showdown nodes are valued exactly, not predicted."),
        }
    }
}

#[cfg(test)]
mod tests {

    use more_asserts::assert_lt;
    use rand::{
        Rng,
        SeedableRng,
    };
    use wyhash::WyRng;

    use crate::poker::card::parse_cards;

    use super::*;

    fn random_network<R: Rng>(rng: &mut R, public_size: usize) -> ValueNetwork {
        let dims = [HOLE_PAIRS * 2 + public_size + 1, 8, HOLE_PAIRS * 2];
        let mut layers = vec![];
        for w in dims.windows(2) {
            let (in_dim, out_dim) = (w[0], w[1]);
            layers.push(Dense {
                in_dim,
                out_dim,
                weights: (0..in_dim * out_dim).map(|_| rng.gen_range(-0.1..0.1)).collect(),
                biases: (0..out_dim).map(|_| rng.gen_range(-0.1..0.1)).collect(),
            });
        }
        ValueNetwork {
            public_size,
            layers,
        }
    }

    fn uniform() -> Vec<f64> {
        vec![1.0 / HOLE_PAIRS as f64; HOLE_PAIRS]
    }

    #[test]
    fn test_zero_network_predicts_zeros() {
        let net = ValueNetwork::zero(3);
        assert!(net.is_zero());
        let (v1, v2) = net.predict(&uniform(), &uniform(), &parse_cards("Jh 8h 4h"), 40);
        assert!(v1.iter().all(|v| *v == 0.0));
        assert!(v2.iter().all(|v| *v == 0.0));
        assert_eq!(0.0, zero_sum_residual(&uniform(), &uniform(), &v1, &v2));
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let mut rng = WyRng::seed_from_u64(21);
        let net = random_network(&mut rng, 3);

        let dir = std::env::temp_dir().join("restack_net_test");
        let path = dir.join("flop").join("epoch_1.ckpt");
        net.save(&path).unwrap();
        let loaded = ValueNetwork::load(&path).unwrap();

        let board = parse_cards("Jh 8h 4h");
        let (v1, v2) = net.predict(&uniform(), &uniform(), &board, 60);
        let (w1, w2) = loaded.predict(&uniform(), &uniform(), &board, 60);
        for (a, b) in v1.iter().zip(w1.iter()).chain(v2.iter().zip(w2.iter())) {
            assert_lt!((a - b).abs(), 1e-12);
        }
    }

    #[test]
    fn test_manager_falls_back_to_zero_networks() {
        let dir = std::env::temp_dir().join("restack_net_missing");
        let manager = NetManager::load(&dir);
        for stage in [Stage::PreFlop, Stage::Flop, Stage::Turn, Stage::River] {
            assert!(manager.network(stage).is_zero());
        }
    }

    #[test]
    fn test_manager_loads_stage_checkpoint() {
        let mut rng = WyRng::seed_from_u64(22);
        let dir = std::env::temp_dir().join("restack_net_load_test");
        let _ = fs::remove_dir_all(&dir);

        random_network(&mut rng, 4).save(&dir.join("turn").join("epoch_3.ckpt")).unwrap();
        let manager = NetManager::load(&dir);
        assert!(manager.network(Stage::PreFlop).is_zero());
        assert!(!manager.network(Stage::Turn).is_zero());
    }

    #[test]
    fn test_load_rejects_mismatched_head() {
        let mut rng = WyRng::seed_from_u64(23);
        let mut net = random_network(&mut rng, 3);
        net.layers.pop();

        let path = std::env::temp_dir().join("restack_net_bad").join("bad.ckpt");
        net.save(&path).unwrap();
        assert!(matches!(ValueNetwork::load(&path), Err(Error::MalformedBlob { .. })));
    }
}
