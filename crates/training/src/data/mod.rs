use std::sync::Arc;

use candle_core::Tensor;
use rand::{rngs::StdRng, seq::SliceRandom};

use crate::{Result, TrainingError};

pub mod transforms;
pub mod vision;

/// Random-access collection of examples.
pub trait Dataset {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the item at `index`, or `IndexOutOfBounds` past the end.
    fn get(&self, index: usize) -> Result<Self::Item>;

    /// Like [`Dataset::get`] for callers holding signed indices; negative
    /// indices are out of bounds rather than counted from the end.
    fn get_signed(&self, index: i64) -> Result<Self::Item> {
        let index = usize::try_from(index)
            .map_err(|_| TrainingError::out_of_bounds(index, self.len()))?;
        self.get(index)
    }
}

impl<D: Dataset + ?Sized> Dataset for &D {
    type Item = D::Item;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        (**self).get(index)
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        (**self).get(index)
    }
}

impl<D: Dataset + ?Sized> Dataset for Box<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        (**self).get(index)
    }
}

/// Inputs and labels stacked along their first dimension.
#[derive(Debug, Clone)]
pub struct TensorDataset {
    inputs: Tensor,
    labels: Tensor,
}

impl TensorDataset {
    pub fn new(inputs: Tensor, labels: Tensor) -> Result<Self> {
        let (Some(inputs_len), Some(labels_len)) =
            (inputs.dims().first().copied(), labels.dims().first().copied())
        else {
            return Err(TrainingError::invalid_argument(
                "tensor dataset needs inputs and labels with a leading example axis",
            ));
        };
        if inputs_len != labels_len {
            return Err(TrainingError::invalid_argument(format!(
                "inputs have {} examples but labels have {}",
                inputs_len, labels_len
            )));
        }
        Ok(Self { inputs, labels })
    }

    pub fn inputs(&self) -> &Tensor {
        &self.inputs
    }

    pub fn labels(&self) -> &Tensor {
        &self.labels
    }
}

impl Dataset for TensorDataset {
    type Item = (Tensor, Tensor);

    fn len(&self) -> usize {
        self.inputs.dims()[0]
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        if index >= self.len() {
            return Err(TrainingError::out_of_bounds(index as i64, self.len()));
        }
        Ok((self.inputs.get(index)?, self.labels.get(index)?))
    }
}

/// Presents several datasets back to back as one.
///
/// Parts are held as given; wrap them in `Arc` or pass references to share
/// them with other owners.
#[derive(Debug, Clone)]
pub struct ConcatDataset<D> {
    parts: Vec<D>,
}

impl<D: Dataset> ConcatDataset<D> {
    pub fn new(parts: Vec<D>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[D] {
        &self.parts
    }

    /// Maps a global index to `(part, index within part)`.
    pub fn locate(&self, index: usize) -> Result<(usize, usize)> {
        let mut local = index;
        for (part, dataset) in self.parts.iter().enumerate() {
            let len = dataset.len();
            if local < len {
                return Ok((part, local));
            }
            local -= len;
        }
        Err(TrainingError::out_of_bounds(index as i64, self.len()))
    }
}

impl<D: Dataset> Dataset for ConcatDataset<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        self.parts.iter().map(|part| part.len()).sum()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        let (part, local) = self.locate(index)?;
        self.parts[part].get(local)
    }
}

/// Pairs every item of a dataset with the matching entry of a parallel
/// auxiliary sequence, e.g. stored predictions for distillation.
#[derive(Debug, Clone)]
pub struct AugmentedDataset<D, A> {
    dataset: D,
    augmented: Vec<A>,
}

impl<D: Dataset, A: Clone> AugmentedDataset<D, A> {
    pub fn new(dataset: D, augmented: Vec<A>) -> Result<Self> {
        if dataset.len() != augmented.len() {
            return Err(TrainingError::invalid_argument(format!(
                "dataset has {} items but augmented data has {}",
                dataset.len(),
                augmented.len()
            )));
        }
        Ok(Self { dataset, augmented })
    }

    pub fn inner(&self) -> &D {
        &self.dataset
    }

    pub fn augmented_data(&self) -> &[A] {
        &self.augmented
    }
}

impl<D: Dataset, A: Clone> Dataset for AugmentedDataset<D, A> {
    type Item = (D::Item, A);

    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        let item = self.dataset.get(index)?;
        let extra = self
            .augmented
            .get(index)
            .cloned()
            .ok_or_else(|| TrainingError::out_of_bounds(index as i64, self.augmented.len()))?;
        Ok((item, extra))
    }
}

/// A dataset seen through a list of indices, e.g. a shuffled epoch order or
/// one side of a split.
#[derive(Debug, Clone)]
pub struct Subset<D> {
    dataset: D,
    indices: Vec<usize>,
}

impl<D: Dataset> Subset<D> {
    pub fn new(dataset: D, indices: Vec<usize>) -> Result<Self> {
        let len = dataset.len();
        if let Some(&index) = indices.iter().find(|&&index| index >= len) {
            return Err(TrainingError::out_of_bounds(index as i64, len));
        }
        Ok(Self { dataset, indices })
    }

    /// Every item of `dataset` once, in an order drawn from `rng`.
    pub fn shuffled(dataset: D, rng: &mut StdRng) -> Self {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        indices.shuffle(rng);
        Self { dataset, indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn inner(&self) -> &D {
        &self.dataset
    }
}

impl<D: Dataset> Dataset for Subset<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        let inner = *self
            .indices
            .get(index)
            .ok_or_else(|| TrainingError::out_of_bounds(index as i64, self.indices.len()))?;
        self.dataset.get(inner)
    }
}

/// Splits `dataset` into disjoint random subsets of the given sizes, which
/// must add up to the dataset length.
pub fn random_split<D: Dataset + Clone>(
    dataset: D,
    lengths: &[usize],
    rng: &mut StdRng,
) -> Result<Vec<Subset<D>>> {
    let total: usize = lengths.iter().sum();
    if total != dataset.len() {
        return Err(TrainingError::invalid_argument(format!(
            "split lengths sum to {} but dataset has {} items",
            total,
            dataset.len()
        )));
    }
    let order = Subset::shuffled(dataset.clone(), rng).indices;
    let mut start = 0;
    Ok(lengths
        .iter()
        .map(|&len| {
            let indices = order[start..start + len].to_vec();
            start += len;
            Subset {
                dataset: dataset.clone(),
                indices,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{seed::SeededRngs, ErrorKind};
    use candle_core::Device;

    #[derive(Debug)]
    struct Range {
        start: u32,
        len: usize,
    }

    impl Dataset for Range {
        type Item = u32;

        fn len(&self) -> usize {
            self.len
        }

        fn get(&self, index: usize) -> Result<u32> {
            if index >= self.len {
                return Err(TrainingError::out_of_bounds(index as i64, self.len));
            }
            Ok(self.start + index as u32)
        }
    }

    fn concat() -> ConcatDataset<Range> {
        ConcatDataset::new(vec![
            Range { start: 0, len: 3 },
            Range { start: 100, len: 0 },
            Range { start: 200, len: 2 },
        ])
    }

    #[test]
    fn concat_walks_parts_in_order() {
        let dataset = concat();
        assert_eq!(dataset.len(), 5);
        let items: Vec<u32> = (0..5).map(|i| dataset.get(i).unwrap()).collect();
        assert_eq!(items, vec![0, 1, 2, 200, 201]);
        assert_eq!(dataset.locate(3).unwrap(), (2, 0));
    }

    #[test]
    fn concat_rejects_out_of_range() {
        let dataset = concat();
        assert_eq!(
            dataset.get(5).unwrap_err().kind(),
            ErrorKind::IndexOutOfBounds
        );
        assert_eq!(
            dataset.get_signed(-1).unwrap_err().kind(),
            ErrorKind::IndexOutOfBounds
        );
        assert_eq!(dataset.get_signed(4).unwrap(), 201);

        let empty: ConcatDataset<Range> = ConcatDataset::new(vec![]);
        assert!(empty.is_empty());
        assert!(empty.get(0).is_err());
    }

    #[test]
    fn concat_shares_parts_through_arc() {
        let part: Arc<dyn Dataset<Item = u32>> = Arc::new(Range { start: 10, len: 2 });
        let dataset = ConcatDataset::new(vec![part.clone(), part]);
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.get(2).unwrap(), 10);
    }

    #[test]
    fn augmented_appends_auxiliary_value() {
        let dataset =
            AugmentedDataset::new(Range { start: 5, len: 3 }, vec!["a", "b", "c"]).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.get(1).unwrap(), (6, "b"));
        assert!(dataset.get(3).is_err());
    }

    #[test]
    fn augmented_checks_lengths() {
        let err = AugmentedDataset::new(Range { start: 0, len: 2 }, vec![1.0f32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn tensor_dataset_slices_rows() {
        let inputs = Tensor::arange(0f32, 6.0, &Device::Cpu)
            .unwrap()
            .reshape((3, 2))
            .unwrap();
        let labels = Tensor::new(&[2u32, 0, 1], &Device::Cpu).unwrap();
        let dataset = TensorDataset::new(inputs, labels).unwrap();

        let (x, y) = dataset.get(1).unwrap();
        assert_eq!(x.to_vec1::<f32>().unwrap(), vec![2.0, 3.0]);
        assert_eq!(y.to_scalar::<u32>().unwrap(), 0);
        assert!(dataset.get(3).is_err());

        let short = Tensor::new(&[1u32], &Device::Cpu).unwrap();
        assert!(TensorDataset::new(dataset.inputs().clone(), short).is_err());
    }

    #[test]
    fn shuffled_subset_visits_every_item_once() {
        let mut rngs = SeededRngs::new(13);
        let subset = Subset::shuffled(Range { start: 10, len: 6 }, &mut rngs.data);
        let mut items: Vec<u32> = (0..subset.len()).map(|i| subset.get(i).unwrap()).collect();
        items.sort_unstable();
        assert_eq!(items, (10..16).collect::<Vec<u32>>());
        assert!(subset.get(6).is_err());

        let mut again = SeededRngs::new(13);
        let replay = Subset::shuffled(Range { start: 10, len: 6 }, &mut again.data);
        assert_eq!(subset.indices(), replay.indices());
    }

    #[test]
    fn subset_rejects_foreign_indices() {
        let err = Subset::new(Range { start: 0, len: 2 }, vec![0, 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfBounds);
        let subset = Subset::new(Range { start: 0, len: 3 }, vec![2, 0]).unwrap();
        assert_eq!(subset.get(0).unwrap(), 2);
    }

    #[test]
    fn random_split_partitions_dataset() {
        let source = Range { start: 0, len: 10 };
        let mut rngs = SeededRngs::new(1);
        let parts = random_split(&source, &[7, 3], &mut rngs.data).unwrap();
        assert_eq!(parts[0].len(), 7);
        assert_eq!(parts[1].len(), 3);
        let mut seen: Vec<usize> = parts
            .iter()
            .flat_map(|part| part.indices().iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<usize>>());

        let err = random_split(&source, &[5, 4], &mut rngs.data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
